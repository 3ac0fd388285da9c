//! Sample acquisition: the device seam, raw captures and the worker session.
//!
//! A [`SampleSource`] produces gapless batches of four-channel samples. A
//! [`Session`] owns one source, one [`Decoder`](crate::Decoder) and one
//! [`FrameSink`](crate::FrameSink) on a dedicated thread.
mod capture;
mod session;
mod source;

pub use capture::{BYTES_PER_SAMPLE, CaptureSource, CaptureWriter, DEFAULT_BATCH_SAMPLES};
pub use session::{Session, SessionReport};
pub use source::{Poll, SampleSource};
pub(crate) use source::log_setup;
