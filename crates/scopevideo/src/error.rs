//! Error types for the decoder, its configuration and the acquisition seam.
//!
//! Only configuration problems and device failures are reported to callers.
//! Bad or noisy input signal is never an error: the decoder absorbs it and
//! resynchronizes on the next valid frame boundary.
use thiserror::Error;

/// Top-level error returned by the public API.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("acquisition device error: {0}")]
    Device(#[from] DeviceError),

    /// A sample batch was built from channel slices of different lengths.
    #[error("channel {channel} holds {got} samples, expected {expected}")]
    BatchShape {
        channel: usize,
        expected: usize,
        got: usize,
    },

    #[error("decoder worker panicked")]
    WorkerPanicked,
}

/// Rejected decoder or acquisition configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("frame geometry must be non-zero (got {columns}x{lines})")]
    EmptyGeometry { columns: usize, lines: usize },

    #[error("frame guard line {guard} must be greater than the active line count {lines}")]
    GuardTooSmall { guard: i32, lines: usize },

    #[error("pre-roll line {0} must not be positive")]
    PositivePreRoll(i32),

    #[error("baseline window {window} must be in 1..{capacity}")]
    BaselineWindow { window: usize, capacity: usize },

    #[error("normalization for {channel} must be a positive finite number (got {value})")]
    Normalization { channel: &'static str, value: f64 },

    #[error("column {column} threshold {threshold} is out of range (must be 3..={capacity})")]
    ThresholdOutOfRange {
        column: usize,
        threshold: i64,
        capacity: usize,
    },

    #[error("column {column} threshold {threshold} does not increase past the previous column")]
    ThresholdNotIncreasing { column: usize, threshold: i64 },

    #[error("channel index {0} is out of range (4 channels)")]
    ChannelIndex(usize),

    #[error("channel {0} is mapped to more than one role")]
    DuplicateChannel(usize),

    #[error("timestamp shift {0} must be below 64")]
    TimestampShift(u32),

    #[error("short pulse gap must be non-zero")]
    ZeroPulseGap,

    #[error("sample interval must be non-zero")]
    ZeroSampleInterval,

    #[error("acquisition buffer must hold at least one sample")]
    ZeroBufferSamples,

    #[error("channel {0} is used by the decoder but disabled in the acquisition setup")]
    ChannelDisabled(usize),

    #[error("device resolution of {0} bits does not fit 16-bit samples")]
    Resolution(u8),

    #[error("channel {channel} analog offset {offset} V exceeds its {range} V input range")]
    AnalogOffset { channel: usize, offset: f32, range: f32 },

    #[error("test pattern timing: {0}")]
    PatternTiming(&'static str),
}

/// Failures reported by a [`SampleSource`](crate::acquire::SampleSource).
#[derive(Error, Debug)]
pub enum DeviceError {
    /// The device could not be opened at all.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// The device opened but rejected part of the setup.
    #[error("failed to configure channel {channel}: {reason}")]
    Configure { channel: usize, reason: String },

    /// Streaming failed after it had started.
    #[error("streaming failed: {0}")]
    Stream(String),

    #[error("failed to spawn decoder thread: {0}")]
    Spawn(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
