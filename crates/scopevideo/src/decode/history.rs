//! Per-line sample history for the three color channels.
use crate::decode::ColorSample;

/// Fixed-capacity store of the raw color samples of the current line.
///
/// Slot `n` holds the `n`-th sample after the horizontal sync edge. The
/// store is overwritten line after line and never grows.
#[derive(Debug, Clone)]
pub struct LineHistory {
    slots: Box<[ColorSample]>,
}

impl LineHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![[0; 3]; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Store `sample` at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset >= capacity`. The decoder never stores past the
    /// capacity because it stops counting line samples there.
    #[inline]
    pub fn store(&mut self, offset: usize, sample: ColorSample) {
        self.slots[offset] = sample;
    }

    #[inline]
    pub fn get(&self, offset: usize) -> ColorSample {
        self.slots[offset]
    }

    /// Per-channel sums over `start..end`.
    pub fn sum(&self, start: usize, end: usize) -> [i64; 3] {
        self.slots[start..end]
            .iter()
            .fold([0i64; 3], |mut acc, sample| {
                for (total, value) in acc.iter_mut().zip(sample) {
                    *total += i64::from(*value);
                }
                acc
            })
    }

    pub fn clear(&mut self) {
        self.slots.fill([0; 3]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_over_window() {
        let mut history = LineHistory::new(8);
        for offset in 0..8 {
            let v = offset as i16;
            history.store(offset, [v, -v, 1000]);
        }
        assert_eq!(history.sum(2, 5), [2 + 3 + 4, -(2 + 3 + 4), 3000]);
        assert_eq!(history.sum(4, 4), [0, 0, 0]);
    }

    #[test]
    fn test_sum_does_not_overflow_i16() {
        let mut history = LineHistory::new(10);
        for offset in 0..10 {
            history.store(offset, [i16::MAX, i16::MIN, 0]);
        }
        assert_eq!(
            history.sum(0, 10),
            [i64::from(i16::MAX) * 10, i64::from(i16::MIN) * 10, 0]
        );
    }

    #[test]
    fn test_clear_zeroes_slots() {
        let mut history = LineHistory::new(3);
        history.store(1, [5, 6, 7]);
        history.clear();
        assert_eq!(history.get(1), [0, 0, 0]);
        assert_eq!(history.capacity(), 3);
    }
}
