//! Fixed-capacity averaging window
//!
//! A [`SampleWindow`] keeps the `N` most recent samples of one measured
//! quantity in a ring and only reports an average once it is full. There is no
//! allocation after construction: the ring lives inline in the struct.

/// Numeric types that can be accumulated in a [`SampleWindow`].
pub trait Sample: Copy + Default {
    /// Mean of `samples` with `offset` added.
    ///
    /// `samples` is never empty.
    fn mean_with_offset(samples: &[Self], offset: Self) -> Self;
}

impl Sample for i32 {
    /// Integer mean rounded to nearest, ties away from zero, then offset.
    fn mean_with_offset(samples: &[Self], offset: Self) -> Self {
        let n = samples.len() as i64;
        let sum: i64 = samples.iter().map(|&v| i64::from(v)).sum();

        let mean = if sum >= 0 {
            (2 * sum + n) / (2 * n)
        } else {
            (2 * sum - n) / (2 * n)
        };

        (mean as i32).saturating_add(offset)
    }
}

impl Sample for f32 {
    fn mean_with_offset(samples: &[Self], offset: Self) -> Self {
        let sum: f32 = samples.iter().sum();
        sum / samples.len() as f32 + offset
    }
}

/// Ring buffer of the `N` most recent samples plus a calibration offset.
///
/// The window is valid only when it holds exactly `N` samples written since
/// construction or the last [`invalidate`](Self::invalidate).
#[derive(Debug, Clone)]
pub struct SampleWindow<T: Sample, const N: usize> {
    samples: [T; N],
    /// Next slot to overwrite
    pos: usize,
    /// Samples held since the last reset, saturating at `N`
    count: usize,
    offset: T,
}

impl<T: Sample, const N: usize> SampleWindow<T, N> {
    /// Create an empty window with a zero offset.
    pub fn new() -> Self {
        const { assert!(N > 0, "a sample window needs a non-zero capacity") };

        Self {
            samples: [T::default(); N],
            pos: 0,
            count: 0,
            offset: T::default(),
        }
    }

    /// Append a sample, evicting the oldest one once the window is full.
    pub fn write(&mut self, value: T) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % N;
        if self.count < N {
            self.count += 1;
        }
    }

    /// Forget every held sample. Storage is reused.
    pub fn invalidate(&mut self) {
        self.count = 0;
    }

    /// Replace the calibration offset. Held samples are untouched.
    pub fn set_offset(&mut self, offset: T) {
        self.offset = offset;
    }

    pub fn is_valid(&self) -> bool {
        self.count == N
    }

    /// Number of samples held since the last reset
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Offset-corrected mean, or `None` until the window is full.
    pub fn average(&self) -> Option<T> {
        if !self.is_valid() {
            return None;
        }

        Some(T::mean_with_offset(&self.samples, self.offset))
    }
}

impl<T: Sample, const N: usize> Default for SampleWindow<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
