//! Small-N median filters.
//!
//! Every buffer here holds at most [`MEDIAN_SAMPLES`] values, so a stack
//! copy plus insertion sort beats anything cleverer.

use heapless::HistoryBuffer;

/// Capacity of the rolling sample window.
pub const MEDIAN_SAMPLES: usize = 7;

/// Median of the finite values in `values` (at most [`MEDIAN_SAMPLES`] are
/// considered).  Even counts average the two middle values.
pub fn median(values: &[f32]) -> Option<f32> {
    let mut sorted = [0.0f32; MEDIAN_SAMPLES];
    let mut n = 0;
    for &v in values.iter().filter(|v| v.is_finite()).take(MEDIAN_SAMPLES) {
        sorted[n] = v;
        n += 1;
    }
    let sorted = &mut sorted[..n];

    for i in 1..sorted.len() {
        let key = sorted[i];
        let mut j = i;
        while j > 0 && sorted[j - 1] > key {
            sorted[j] = sorted[j - 1];
            j -= 1;
        }
        sorted[j] = key;
    }

    match n {
        0 => None,
        n if n % 2 == 1 => Some(sorted[n / 2]),
        n => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Circular window over the last [`MEDIAN_SAMPLES`] valid samples.
#[derive(Debug, Default)]
pub struct SampleWindow {
    samples: HistoryBuffer<f32, MEDIAN_SAMPLES>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a sample; the oldest falls off once the window is full.
    pub fn push(&mut self, celsius: f32) {
        self.samples.write(celsius);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.len() == 0
    }

    /// Median over the window, or `None` with fewer than two samples.
    pub fn median(&self) -> Option<f32> {
        if self.samples.len() < 2 {
            return None;
        }
        let mut buf = [0.0f32; MEDIAN_SAMPLES];
        let n = self.samples.len();
        buf[..n].copy_from_slice(self.samples.as_slice());
        median(&buf[..n])
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
