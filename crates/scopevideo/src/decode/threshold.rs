//! Column threshold table.
//!
//! Samples arrive at a fixed rate but the picture has a fixed width, so each
//! output column corresponds to a target count of samples after the
//! horizontal sync edge. The mapping is linear and computed once.
use crate::config::DecoderConfig;
use crate::error::ConfigError;

/// Taps of the pixel filter. The current sample fills two of them.
pub(crate) const FILTER_TAPS: usize = 3;

/// Immutable table of per-column sample offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnThresholds {
    offsets: Box<[usize]>,
}

impl ColumnThresholds {
    /// Build the table as `round(slope * column + intercept)` for every column.
    ///
    /// Every entry must leave room for the pixel filter taps, fit inside the
    /// line history, and be strictly greater than the previous one; a column
    /// whose threshold is never reached would leave the rest of the line
    /// undecoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopevideo::DecoderConfig;
    /// use scopevideo::decode::ColumnThresholds;
    ///
    /// let table = ColumnThresholds::new(&DecoderConfig::default()).unwrap();
    /// assert_eq!(table.len(), 256);
    /// assert_eq!(table.get(0), Some(373));
    /// assert_eq!(table.get(255), Some(1857));
    /// ```
    pub fn new(config: &DecoderConfig) -> Result<Self, ConfigError> {
        let capacity = config.history_capacity;
        let mut offsets = Vec::with_capacity(config.active_columns);
        let mut previous: Option<i64> = None;
        for column in 0..config.active_columns {
            let threshold = (config.column_slope * column as f64 + config.column_intercept).round();
            let threshold = threshold as i64;
            if threshold < FILTER_TAPS as i64 || threshold > capacity as i64 {
                return Err(ConfigError::ThresholdOutOfRange {
                    column,
                    threshold,
                    capacity,
                });
            }
            if previous.is_some_and(|p| threshold <= p) {
                return Err(ConfigError::ThresholdNotIncreasing { column, threshold });
            }
            previous = Some(threshold);
            offsets.push(threshold as usize);
        }
        Ok(Self {
            offsets: offsets.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Target sample count for `column`, or `None` past the last column.
    #[inline]
    pub fn get(&self, column: usize) -> Option<usize> {
        self.offsets.get(column).copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_matches_calibration() {
        let table = ColumnThresholds::new(&DecoderConfig::default()).unwrap();
        // Spot checks against trunc(5.818897637795276 * c + 373.5).
        for column in [0usize, 1, 2, 17, 100, 128, 254, 255] {
            let expected = (5.818897637795276 * column as f64 + 373.5) as usize;
            assert_eq!(table.get(column), Some(expected), "column {}", column);
        }
        assert_eq!(table.get(256), None);
        assert!(table.as_slice().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_threshold_beyond_history_rejected() {
        let config = DecoderConfig {
            history_capacity: 1000,
            ..Default::default()
        };
        assert!(matches!(
            ColumnThresholds::new(&config),
            Err(ConfigError::ThresholdOutOfRange { capacity: 1000, .. })
        ));
    }

    #[test]
    fn test_flat_slope_rejected() {
        let config = DecoderConfig {
            column_slope: 0.4,
            ..Default::default()
        };
        assert!(matches!(
            ColumnThresholds::new(&config),
            Err(ConfigError::ThresholdNotIncreasing { .. })
        ));
    }

    #[test]
    fn test_threshold_too_early_for_filter() {
        let config = DecoderConfig {
            column_intercept: 1.0,
            ..Default::default()
        };
        assert!(matches!(
            ColumnThresholds::new(&config),
            Err(ConfigError::ThresholdOutOfRange { column: 0, threshold: 1, .. })
        ));
    }
}
