// Fixed-length rolling sample buffers for chart traces
use std::collections::VecDeque;

/// FIFO buffer with push-evict-oldest semantics. Constructed already
/// full of a baseline value and never changes length, so chart geometry
/// stays stable from the first frame.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize, baseline: f64) -> Self {
        let mut samples = VecDeque::with_capacity(capacity);
        samples.resize(capacity, baseline);
        Self { samples, capacity }
    }

    /// Drop the oldest sample and append the new one at the tail.
    pub fn push(&mut self, value: f64) {
        self.samples.pop_front();
        self.samples.push_back(value);
    }

    /// Overwrite every sample with a constant.
    pub fn fill(&mut self, value: f64) {
        for sample in self.samples.iter_mut() {
            *sample = value;
        }
    }

    /// Regenerate the whole buffer, one sample per slot.
    pub fn refill_with(&mut self, mut sample: impl FnMut() -> f64) {
        for slot in self.samples.iter_mut() {
            *slot = sample();
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}
