//! Decoder and acquisition configuration.
//!
//! Every calibration constant the decoder relies on lives here as a named
//! field with a default that matches the reference capture rig: a 256x240
//! picture sampled every 32 ns on four channels. All structs deserialize with
//! `#[serde(default)]`, so a config file only needs the fields it changes.
//!
//! # Examples
//!
//! ```
//! use scopevideo::DecoderConfig;
//!
//! let mut config = DecoderConfig::default();
//! config.short_pulse_gap = 350;
//! assert!(config.validate().is_ok());
//! assert_eq!(config.emission_window(), 240..999);
//! ```
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of physical channels delivered by the acquisition device.
pub const CHANNEL_COUNT: usize = 4;

/// Names used for the three color channels in diagnostics.
pub const COLOR_NAMES: [&str; 3] = ["red", "green", "blue"];

/// Which physical channel carries which signal.
///
/// Indices refer to device channels `0..4` (A, B, C, D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMap {
    pub sync: usize,
    pub red: usize,
    pub green: usize,
    pub blue: usize,
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            sync: 3,
            red: 1,
            green: 2,
            blue: 0,
        }
    }
}

impl ChannelMap {
    /// Physical channel indices of the color components, in red, green, blue order.
    pub fn colors(&self) -> [usize; 3] {
        [self.red, self.green, self.blue]
    }

    /// Check that every role points at a distinct, existing channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let roles = [self.sync, self.red, self.green, self.blue];
        for (i, &channel) in roles.iter().enumerate() {
            if channel >= CHANNEL_COUNT {
                return Err(ConfigError::ChannelIndex(channel));
            }
            if roles[..i].contains(&channel) {
                return Err(ConfigError::DuplicateChannel(channel));
            }
        }
        Ok(())
    }
}

/// Parameters of the sync state machine and the pixel calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Output width in pixels.
    pub active_columns: usize,
    /// Output height in lines.
    pub active_lines: usize,
    /// Sync level separating "in sync pulse" (below) from video (at or above).
    pub sync_threshold: i16,
    /// Rising-to-falling distance (in samples) below which a falling edge
    /// ends a frame instead of a line.
    pub short_pulse_gap: u64,
    /// Line number assigned right after a frame boundary.
    pub pre_roll_line: i32,
    /// Upper bound of the emission window; also the line number the decoder
    /// starts from, so nothing is emitted before the first boundary.
    pub frame_guard_line: i32,
    /// Samples kept per line for interpolation and baseline estimation.
    pub history_capacity: usize,
    /// Samples averaged to estimate the black level at each line start.
    pub baseline_window: usize,
    /// Constant subtracted from the measured black level.
    pub baseline_offset: f64,
    /// Samples per output column.
    pub column_slope: f64,
    /// Sample offset of column zero, measured from the horizontal sync edge.
    pub column_intercept: f64,
    /// Per-channel full-scale divisors, red, green, blue.
    pub normalization: [f64; 3],
    /// Right shift turning a logical sample index into a frame timestamp.
    pub timestamp_shift: u32,
    pub channels: ChannelMap,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            active_columns: 256,
            active_lines: 240,
            sync_threshold: 0,
            short_pulse_gap: 400,
            pre_roll_line: -15,
            frame_guard_line: 999,
            history_capacity: 6000,
            baseline_window: 10,
            baseline_offset: 200.0,
            column_slope: 5.818897637795276,
            column_intercept: 373.0,
            normalization: [23400.0, 22300.0, 21400.0],
            timestamp_shift: 6,
            channels: ChannelMap::default(),
        }
    }
}

impl DecoderConfig {
    /// Line numbers at which a frame boundary emits the current frame.
    pub fn emission_window(&self) -> Range<i32> {
        self.active_lines as i32..self.frame_guard_line
    }

    /// Size in bytes of one packed RGBA frame.
    pub fn frame_bytes(&self) -> usize {
        self.active_columns * self.active_lines * 4
    }

    /// Validate the scalar parameters.
    ///
    /// The column threshold table is checked separately when it is built,
    /// see [`ColumnThresholds::new`](crate::decode::ColumnThresholds::new).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.active_columns == 0 || self.active_lines == 0 {
            return Err(ConfigError::EmptyGeometry {
                columns: self.active_columns,
                lines: self.active_lines,
            });
        }
        if i64::from(self.frame_guard_line) <= self.active_lines as i64 {
            return Err(ConfigError::GuardTooSmall {
                guard: self.frame_guard_line,
                lines: self.active_lines,
            });
        }
        if self.pre_roll_line > 0 {
            return Err(ConfigError::PositivePreRoll(self.pre_roll_line));
        }
        if self.baseline_window == 0 || self.baseline_window >= self.history_capacity {
            return Err(ConfigError::BaselineWindow {
                window: self.baseline_window,
                capacity: self.history_capacity,
            });
        }
        for (value, channel) in self.normalization.iter().zip(COLOR_NAMES) {
            if !value.is_finite() || *value <= 0.0 {
                return Err(ConfigError::Normalization {
                    channel,
                    value: *value,
                });
            }
        }
        if self.timestamp_shift >= 64 {
            return Err(ConfigError::TimestampShift(self.timestamp_shift));
        }
        if self.short_pulse_gap == 0 {
            return Err(ConfigError::ZeroPulseGap);
        }
        self.channels.validate()
    }
}

/// Input coupling of a device channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coupling {
    Ac,
    Dc,
}

/// Input voltage range of a device channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputRange {
    Mv200,
    Mv500,
    V1,
    V2,
}

impl InputRange {
    /// Full-scale voltage of the range.
    pub fn volts(self) -> f32 {
        match self {
            InputRange::Mv200 => 0.2,
            InputRange::Mv500 => 0.5,
            InputRange::V1 => 1.0,
            InputRange::V2 => 2.0,
        }
    }
}

/// Front-end setup of one device channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelSetup {
    pub enabled: bool,
    pub coupling: Coupling,
    pub range: InputRange,
    /// Analog offset added before digitizing, in volts.
    pub analog_offset: f32,
}

impl ChannelSetup {
    /// Input voltages at the bottom and top of the digitizer's scale, once
    /// the analog offset is applied.
    pub fn input_window(&self) -> (f32, f32) {
        let range = self.range.volts();
        (-range - self.analog_offset, range - self.analog_offset)
    }

    /// Color channel setup: DC coupled, 1 V range, -0.2 V offset.
    pub const fn color() -> Self {
        Self {
            enabled: true,
            coupling: Coupling::Dc,
            range: InputRange::V1,
            analog_offset: -0.2,
        }
    }

    /// Sync channel setup: DC coupled, 200 mV range, -0.15 V offset.
    pub const fn sync() -> Self {
        Self {
            enabled: true,
            coupling: Coupling::Dc,
            range: InputRange::Mv200,
            analog_offset: -0.15,
        }
    }
}

/// Streaming parameters handed to [`SampleSource::open`](crate::acquire::SampleSource::open).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Nominal time between two samples, in nanoseconds.
    pub sample_interval_ns: u32,
    /// Capacity of each registered per-channel buffer.
    pub buffer_samples: usize,
    /// Device vertical resolution in bits.
    pub resolution_bits: u8,
    pub channels: [ChannelSetup; CHANNEL_COUNT],
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_interval_ns: 32,
            buffer_samples: 312_500,
            resolution_bits: 8,
            channels: [
                ChannelSetup::color(),
                ChannelSetup::color(),
                ChannelSetup::color(),
                ChannelSetup::sync(),
            ],
        }
    }
}

impl AcquisitionConfig {
    /// Nominal sample rate in Hz.
    pub fn sample_rate_hz(&self) -> f64 {
        1e9 / f64::from(self.sample_interval_ns.max(1))
    }

    /// Validate the setup against the channels a decoder will read.
    pub fn validate(&self, map: &ChannelMap) -> Result<(), ConfigError> {
        if self.sample_interval_ns == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if self.buffer_samples == 0 {
            return Err(ConfigError::ZeroBufferSamples);
        }
        if !(1..=16).contains(&self.resolution_bits) {
            return Err(ConfigError::Resolution(self.resolution_bits));
        }
        map.validate()?;
        for channel in [map.sync, map.red, map.green, map.blue] {
            if !self.channels[channel].enabled {
                return Err(ConfigError::ChannelDisabled(channel));
            }
        }
        for (channel, setup) in self.channels.iter().enumerate().filter(|(_, s)| s.enabled) {
            let range = setup.range.volts();
            if !setup.analog_offset.is_finite() || setup.analog_offset.abs() > range {
                return Err(ConfigError::AnalogOffset {
                    channel,
                    offset: setup.analog_offset,
                    range,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = DecoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_bytes(), 256 * 240 * 4);
        let acquisition = AcquisitionConfig::default();
        assert!(acquisition.validate(&config.channels).is_ok());
        assert_eq!(acquisition.sample_rate_hz(), 31_250_000.0);
    }

    #[test]
    fn test_guard_must_exceed_active_lines() {
        let config = DecoderConfig {
            active_lines: 999,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::GuardTooSmall {
                guard: 999,
                lines: 999
            })
        );
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut config = DecoderConfig::default();
        config.channels.green = config.channels.sync;
        assert_eq!(config.validate(), Err(ConfigError::DuplicateChannel(3)));
    }

    #[test]
    fn test_bad_normalization_rejected() {
        let mut config = DecoderConfig::default();
        config.normalization[2] = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Normalization {
                channel: "blue",
                ..
            })
        ));
    }

    #[test]
    fn test_disabled_channel_rejected() {
        let mut acquisition = AcquisitionConfig::default();
        acquisition.channels[3].enabled = false;
        assert_eq!(
            acquisition.validate(&ChannelMap::default()),
            Err(ConfigError::ChannelDisabled(3))
        );
    }

    #[test]
    fn test_input_window_follows_offset() {
        let sync = ChannelSetup::sync().input_window();
        assert!((sync.0 - -0.05).abs() < 1e-6);
        assert!((sync.1 - 0.35).abs() < 1e-6);
        let color = ChannelSetup::color().input_window();
        assert!((color.0 - -0.8).abs() < 1e-6);
        assert!((color.1 - 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_offset_beyond_range_rejected() {
        let mut acquisition = AcquisitionConfig::default();
        acquisition.channels[3].analog_offset = -0.25;
        assert_eq!(
            acquisition.validate(&ChannelMap::default()),
            Err(ConfigError::AnalogOffset {
                channel: 3,
                offset: -0.25,
                range: 0.2
            })
        );
    }

    #[test]
    fn test_resolution_must_fit_samples() {
        let acquisition = AcquisitionConfig {
            resolution_bits: 0,
            ..Default::default()
        };
        assert_eq!(
            acquisition.validate(&ChannelMap::default()),
            Err(ConfigError::Resolution(0))
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DecoderConfig =
            serde_json::from_str(r#"{ "short_pulse_gap": 320, "channels": { "sync": 0, "blue": 3 } }"#)
                .unwrap();
        assert_eq!(config.short_pulse_gap, 320);
        assert_eq!(config.active_columns, 256);
        assert_eq!(config.channels.sync, 0);
        assert_eq!(config.channels.blue, 3);
        assert_eq!(config.channels.red, 1);
        assert!(config.validate().is_ok());
    }
}
