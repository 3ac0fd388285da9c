#![doc = include_str!("../README.md")]
//! scopevideo: streaming decoder for video captured with a four-channel oscilloscope
//!
//! One channel carries composite sync, the other three carry the analog red,
//! green and blue signals. The decoder walks the samples in order, tracks
//! horizontal and vertical sync, and rebuilds packed RGBA frames.
//!
//! Key pieces:
//! - [`Decoder`]: the per-sample state machine. Feed it [`SampleBatch`]es of
//!   any size with [`Decoder::push_batch`]; completed frames go to a
//!   [`FrameSink`].
//! - [`DecoderConfig`] / [`AcquisitionConfig`]: every calibration constant,
//!   serde-friendly with working defaults.
//! - [`acquire`]: the [`SampleSource`](acquire::SampleSource) device seam,
//!   raw capture replay and the threaded [`Session`].
//! - [`synth`]: synthetic captures for testing and calibration.
//!
//! Signal problems are never errors. A noisy or missing sync costs frames,
//! never a crash, and the decoder relocks on the next clean frame boundary.
//!
//! Example: offline decoding
//!
//! ```rust
//! use scopevideo::{Decoder, DecoderConfig, Frame, SampleBatch};
//!
//! let mut decoder = Decoder::new(DecoderConfig::default()).unwrap();
//! let mut frames: Vec<Frame> = Vec::new();
//!
//! // Planar per-channel buffers as delivered by the device.
//! let a = vec![0i16; 1024];
//! let b = vec![0i16; 1024];
//! let c = vec![0i16; 1024];
//! let d = vec![100i16; 1024];
//! let batch = SampleBatch::new([&a[..], &b[..], &c[..], &d[..]]).unwrap();
//! decoder.push_batch(batch, &mut frames);
//!
//! // A flat sync channel never produces a frame.
//! assert!(frames.is_empty());
//! assert_eq!(decoder.total_samples(), 1024);
//! ```
//!
//! Example: decoding on a worker thread
//!
//! ```rust
//! use scopevideo::{AcquisitionConfig, ChannelSink, DecoderConfig, Session};
//! use scopevideo::synth::{SyntheticSource, TestPattern};
//!
//! let config = DecoderConfig::default();
//! let pattern = TestPattern::solid(&config, [200, 100, 50]);
//! let source = SyntheticSource::new(pattern, 3).with_batch_sizes(&[4096, 777]);
//! let (sink, frames) = ChannelSink::new(8);
//!
//! let session = Session::start(source, sink, config, AcquisitionConfig::default()).unwrap();
//! let report = session.wait().unwrap();
//! assert_eq!(report.stats.frames_emitted, 3);
//!
//! for frame in frames.try_iter() {
//!     assert_eq!(frame.pixel(10, 10), Some([200, 100, 50, 255]));
//! }
//! ```
pub mod acquire;
pub mod config;
pub mod decode;
mod error;
pub mod sample;
pub mod sink;
pub mod synth;

pub use acquire::{CaptureSource, CaptureWriter, Poll, SampleSource, Session, SessionReport};
pub use config::{AcquisitionConfig, ChannelMap, ChannelSetup, Coupling, DecoderConfig, InputRange};
pub use decode::{Decoder, DecoderStats, Frame};
pub use error::{ConfigError, DeviceError, Error, Result};
pub use sample::{SampleBatch, SampleBuffer};
pub use sink::{ChannelSink, FrameSink};
