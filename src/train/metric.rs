/// Running weighted mean of a streamed scalar, plus the last value seen.
///
/// One instance serves one sequential pass; nothing here is shared.
#[derive(Debug, Clone, Default)]
pub struct MetricAccumulator {
    sum: f64,
    weight: f64,
    count: usize,
    last: f64,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1.0);
    }

    pub fn update_weighted(&mut self, value: f64, weight: f64) {
        self.last = value;
        self.sum += value * weight;
        self.weight += weight;
        self.count += 1;
    }

    /// Weighted mean so far; `None` before the first update.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.sum / self.weight)
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
