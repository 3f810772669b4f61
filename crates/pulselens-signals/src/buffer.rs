//! Fixed-capacity circular sample storage.
//!
//! Capacity is a power of two so that the dyadic wavelet decomposition can run
//! over a full buffer and so that slot indexing is a mask instead of a modulo.
//! Pushing into a full buffer overwrites the oldest sample.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};

/// One scalar waveform point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub value: f32,
    /// Capture time, epoch milliseconds.
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn new(value: f32, timestamp_ms: i64) -> Self {
        Self { value, timestamp_ms }
    }
}

/// Bounded FIFO history, oldest to newest.
#[derive(Debug, Clone)]
pub struct RingSampleBuffer<T: Copy = Sample> {
    slots: Vec<T>,
    mask: usize,
    /// Index of the next write.
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingSampleBuffer<T> {
    /// Create a buffer holding at most `capacity` items.
    ///
    /// Fails with [`SignalError::CapacityNotPowerOfTwo`] unless `capacity` is a
    /// non-zero power of two.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(SignalError::CapacityNotPowerOfTwo(capacity));
        }
        Ok(Self {
            slots: vec![T::default(); capacity],
            mask: capacity - 1,
            head: 0,
            len: 0,
        })
    }

    /// Create a buffer whose capacity is `min_capacity` rounded up to a power of two.
    pub fn with_min_capacity(min_capacity: usize) -> Self {
        let capacity = min_capacity.max(1).next_power_of_two();
        Self {
            slots: vec![T::default(); capacity],
            mask: capacity - 1,
            head: 0,
            len: 0,
        }
    }
}

impl<T: Copy> RingSampleBuffer<T> {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    /// Append, evicting the oldest item when full.
    pub fn push(&mut self, item: T) {
        self.slots[self.head] = item;
        self.head = (self.head + 1) & self.mask;
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Drop every item; capacity is unchanged.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    fn start(&self) -> usize {
        (self.head + self.slots.len() - self.len) & self.mask
    }

    /// Item `i` counting from the oldest.
    pub fn get(&self, i: usize) -> Option<T> {
        if i >= self.len {
            return None;
        }
        Some(self.slots[(self.start() + i) & self.mask])
    }

    pub fn latest(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.slots[(self.head + self.slots.len() - 1) & self.mask])
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len).map(move |i| self.slots[(self.start() + i) & self.mask])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// The `n` most recent items, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<T> {
        let skip = self.len.saturating_sub(n);
        self.iter().skip(skip).collect()
    }
}

impl RingSampleBuffer<Sample> {
    /// Sample values, oldest first.
    pub fn values(&self) -> Vec<f32> {
        self.iter().map(|s| s.value).collect()
    }

    /// Time covered by the buffered samples.
    pub fn span_ms(&self) -> i64 {
        match (self.get(0), self.latest()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_power_of_two() {
        assert_eq!(
            RingSampleBuffer::<Sample>::with_capacity(100).unwrap_err(),
            SignalError::CapacityNotPowerOfTwo(100)
        );
        assert!(RingSampleBuffer::<f32>::with_capacity(0).is_err());
        assert!(RingSampleBuffer::<f32>::with_capacity(256).is_ok());
    }

    #[test]
    fn test_min_capacity_rounds_up() {
        assert_eq!(RingSampleBuffer::<f32>::with_min_capacity(60).capacity(), 64);
        assert_eq!(RingSampleBuffer::<f32>::with_min_capacity(256).capacity(), 256);
        assert_eq!(RingSampleBuffer::<f32>::with_min_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut buf = RingSampleBuffer::<f32>::with_capacity(4).unwrap();
        for v in 0..6 {
            buf.push(v as f32);
        }
        assert_eq!(buf.len(), 4);
        assert!(buf.is_full());
        assert_eq!(buf.to_vec(), vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buf.latest(), Some(5.0));
        assert_eq!(buf.get(0), Some(2.0));
        assert_eq!(buf.get(4), None);
    }

    #[test]
    fn test_last_n_and_clear() {
        let mut buf = RingSampleBuffer::<f32>::with_capacity(8).unwrap();
        for v in [1.0, 2.0, 3.0] {
            buf.push(v);
        }
        assert_eq!(buf.last_n(2), vec![2.0, 3.0]);
        assert_eq!(buf.last_n(10), vec![1.0, 2.0, 3.0]);

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.latest(), None);
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn test_sample_values_and_span() {
        let mut buf = RingSampleBuffer::<Sample>::with_capacity(4).unwrap();
        buf.push(Sample::new(190.0, 1_000));
        buf.push(Sample::new(195.0, 1_033));
        buf.push(Sample::new(192.0, 1_066));
        assert_eq!(buf.values(), vec![190.0, 195.0, 192.0]);
        assert_eq!(buf.span_ms(), 66);
    }
}
