//! Black-level estimation.
//!
//! The color inputs leak a slowly drifting offset, so the idle level is
//! measured again at the start of every active line, from the samples taken
//! while the sync pulse was still low.
use crate::decode::history::LineHistory;

/// Per-channel additive correction, red, green, blue.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Baseline(pub [f64; 3]);

impl Baseline {
    /// Estimate the correction from `history[end - window..end]`.
    ///
    /// The result is `-(mean of the window) - offset` per channel, ready to
    /// be added to a raw sample average. Returns `None` when fewer than
    /// `window` samples precede `end`.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopevideo::decode::{Baseline, LineHistory};
    ///
    /// let mut history = LineHistory::new(32);
    /// for offset in 0..12 {
    ///     history.store(offset, [-1000, -500, 0]);
    /// }
    /// let baseline = Baseline::measure(&history, 12, 10, 200.0).unwrap();
    /// assert_eq!(baseline.0, [800.0, 300.0, -200.0]);
    /// assert!(Baseline::measure(&history, 9, 10, 200.0).is_none());
    /// ```
    pub fn measure(history: &LineHistory, end: usize, window: usize, offset: f64) -> Option<Self> {
        if window == 0 || end < window {
            return None;
        }
        let sums = history.sum(end - window, end);
        Some(Self(
            sums.map(|sum| -(sum as f64) / window as f64 - offset),
        ))
    }
}
