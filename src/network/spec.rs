use serde::{Serialize, Deserialize};

/// Architecture of a tagger network.
///
/// - `input_size`    — feature width of one example
/// - `hidden_layers` — ReLU layer widths, input side first
/// - `output_size`   — number of labels; the output layer is Sigmoid
/// - `dropout`       — applied to every hidden layer's output in train mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub input_size: usize,
    pub hidden_layers: Vec<usize>,
    pub output_size: usize,
    pub dropout: f64,
}
