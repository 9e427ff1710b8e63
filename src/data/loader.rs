use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::{Dataset, Split};
use crate::math::matrix::Matrix;

/// One mini-batch: `n × input_size` inputs and `n × label_count` targets.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Matrix,
    pub targets: Matrix,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.inputs.rows
    }
}

/// Anything that can hand the training core a sequence of batches, one pass
/// at a time.
pub trait BatchSource {
    fn split(&self) -> Split;

    /// Number of batches one pass yields.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a new pass.
    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_>;
}

/// Batches a `Dataset` in a freshly shuffled order on every pass. The last
/// batch of a pass may be smaller than `batch_size`.
pub struct DataLoader {
    dataset: Dataset,
    split: Split,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl DataLoader {
    pub fn new(dataset: Dataset, split: Split, batch_size: usize, seed: Option<u64>) -> DataLoader {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        DataLoader { dataset, split, batch_size: batch_size.max(1), shuffle: true, rng }
    }

    /// Keeps dataset order across passes.
    pub fn without_shuffle(mut self) -> DataLoader {
        self.shuffle = false;
        self
    }
}

impl BatchSource for DataLoader {
    fn split(&self) -> Split {
        self.split
    }

    fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Batch> + '_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        let dataset = &self.dataset;
        let batch_size = self.batch_size;

        Box::new((0..order.len()).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(order.len());
            let idx = &order[start..end];
            let gather = |rows: &Vec<Vec<f64>>, width: usize| Matrix {
                rows: idx.len(),
                cols: width,
                data: idx.iter().flat_map(|&i| rows[i].iter().copied()).collect(),
            };
            Batch {
                inputs: gather(&dataset.inputs, dataset.input_size()),
                targets: gather(&dataset.targets, dataset.label_count()),
            }
        }))
    }
}
