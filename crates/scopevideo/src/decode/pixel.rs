//! Pixel reconstruction from filtered color samples.
use crate::decode::ColorSample;
use crate::decode::baseline::Baseline;
use crate::decode::history::LineHistory;
use crate::decode::threshold::FILTER_TAPS;

/// Alpha written with every decoded pixel.
pub const OPAQUE: u8 = 0xff;

/// Map one calibrated channel level onto `0..=255`.
///
/// `(average + baseline) / normalization * 255`, rounded half up by adding
/// 0.5 and truncating, then clamped. Out-of-range values saturate instead of
/// wrapping.
///
/// # Examples
///
/// ```
/// use scopevideo::decode::quantize;
///
/// assert_eq!(quantize(11946.0, -200.0, 23400.0), 128);
/// assert_eq!(quantize(-5000.0, -200.0, 23400.0), 0);
/// assert_eq!(quantize(90000.0, 0.0, 23400.0), 255);
/// ```
#[inline]
pub fn quantize(average: f64, baseline: f64, normalization: f64) -> u8 {
    let scaled = (average + baseline) / normalization * 255.0 + 0.5;
    // `as` truncates toward zero and saturates, clamping finishes the job.
    (scaled as i32).clamp(0, 255) as u8
}

/// Converts the samples around a column threshold into an RGBA pixel.
#[derive(Debug, Clone, Copy)]
pub struct PixelReconstructor {
    normalization: [f64; 3],
}

impl PixelReconstructor {
    pub fn new(normalization: [f64; 3]) -> Self {
        Self { normalization }
    }

    /// Build the pixel for the sample just stored at `history[filled - 1]`.
    ///
    /// Three taps are summed: the current sample, then `history[filled - 1]`
    /// and `history[filled - 2]`. The current sample is itself the newest
    /// history entry, so it is weighted twice against the one before it,
    /// `(2 * current + previous) / 3`. Decoded colors are calibrated against
    /// this weighting.
    ///
    /// `filled` is the number of samples of this line already in `history`
    /// and must be at least two.
    pub fn reconstruct(&self, history: &LineHistory, filled: usize, baseline: &Baseline) -> [u8; 4] {
        debug_assert!(filled >= FILTER_TAPS - 1);
        let current = history.get(filled - 1);
        let sums = history.sum(filled - (FILTER_TAPS - 1), filled);
        let mut pixel = [0, 0, 0, OPAQUE];
        for channel in 0..3 {
            let total = sums[channel] + i64::from(current[channel]);
            let average = total as f64 * (1.0 / FILTER_TAPS as f64);
            pixel[channel] = quantize(average, baseline.0[channel], self.normalization[channel]);
        }
        pixel
    }

    /// Same as [`reconstruct`](Self::reconstruct) when the current and the
    /// previous sample are equal. Used to predict decoder output for flat input.
    pub fn flat(&self, sample: ColorSample, baseline: &Baseline) -> [u8; 4] {
        let mut pixel = [0, 0, 0, OPAQUE];
        for channel in 0..3 {
            let average = f64::from(sample[channel]) * FILTER_TAPS as f64 * (1.0 / FILTER_TAPS as f64);
            pixel[channel] = quantize(average, baseline.0[channel], self.normalization[channel]);
        }
        pixel
    }
}
