use crate::{
    activation::activation::ActivationFunction,
    layers::{dense::Layer, parameter::Parameter},
    math::matrix::Matrix,
    network::{
        model::{Mode, Model},
        spec::NetworkSpec,
    },
};

/// Feed-forward multi-label tagger: ReLU hidden layers, Sigmoid head.
#[derive(Debug)]
pub struct Network {
    pub layers: Vec<Layer>,
    mode: Mode,
}

impl Network {
    pub fn from_spec(spec: &NetworkSpec) -> Network {
        let mut layers = Vec::with_capacity(spec.hidden_layers.len() + 1);
        let mut input_size = spec.input_size;
        for (i, &size) in spec.hidden_layers.iter().enumerate() {
            layers.push(Layer::new(i, size, input_size, ActivationFunction::ReLU, spec.dropout));
            input_size = size;
        }
        layers.push(Layer::new(
            spec.hidden_layers.len(),
            spec.output_size,
            input_size,
            ActivationFunction::Sigmoid,
            0.0,
        ));
        Network { layers, mode: Mode::Train }
    }

    /// With `fine_tune == false` only the output layer trains; every earlier
    /// layer is frozen.
    pub fn set_fine_tune(&mut self, fine_tune: bool) {
        let head = self.layers.len().saturating_sub(1);
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let trainable = fine_tune || i == head;
            layer.weights.trainable = trainable;
            layer.biases.trainable = trainable;
        }
    }
}

impl Model for Network {
    fn forward(&mut self, inputs: &Matrix) -> Matrix {
        let mode = self.mode;
        self.layers
            .iter_mut()
            .fold(inputs.clone(), |current, layer| layer.feed_from(&current, mode))
    }

    fn backward(&mut self, grad_output: &Matrix) {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad);
        }
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.layers.iter().flat_map(|l| [&l.weights, &l.biases]).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers
            .iter_mut()
            .flat_map(|l| [&mut l.weights, &mut l.biases])
            .collect()
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size())
    }

    fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.size)
    }
}
