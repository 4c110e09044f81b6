//! Fixed-capacity circular buffers for running averages
//!
//! Every slot holds an optional sample. A `None` slot is a missing reading,
//! so averages never mix in a sentinel value.

/// Number of slots in every running-average buffer
pub const BUFFER_SIZE: usize = 15;

/// A single measurement, or `None` when the reading was missing
pub type Sample = Option<f32>;

/// Buffer sized for the station's sample history
pub type SampleBuffer = RunningBuffer<BUFFER_SIZE>;

/// Circular buffer of `N` optional samples
///
/// Starts with every slot missing. Each write replaces the slot written `N`
/// writes earlier, including writes of missing samples.
#[derive(Debug, Clone)]
pub struct RunningBuffer<const N: usize> {
    slots: [Sample; N],
    write_index: usize,
}

impl<const N: usize> RunningBuffer<N> {
    pub fn new() -> Self {
        Self {
            slots: [None; N],
            write_index: 0,
        }
    }

    /// Overwrite the slot at the write index and advance the index
    pub fn write(&mut self, sample: Sample) {
        self.slots[self.write_index] = sample;
        self.write_index = (self.write_index + 1) % N;
    }

    /// Arithmetic mean over present samples, `None` if none are present
    pub fn mean(&self) -> Option<f32> {
        let (sum, count) = self
            .slots
            .iter()
            .flatten()
            .fold((0.0_f32, 0_usize), |(sum, count), value| (sum + value, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f32)
        }
    }

    /// Slot that the next write will replace
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn slots(&self) -> &[Sample; N] {
        &self.slots
    }
}

impl<const N: usize> Default for RunningBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Count positions where both buffers hold a present sample
///
/// Used as a joint health figure for quantities read together, such as
/// temperature and humidity from one sensor.
pub fn paired_valid_count<const N: usize>(a: &RunningBuffer<N>, b: &RunningBuffer<N>) -> usize {
    a.slots()
        .iter()
        .zip(b.slots().iter())
        .filter(|(x, y)| x.is_some() && y.is_some())
        .count()
}
