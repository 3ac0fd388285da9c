//! The sample-by-sample video decoder and its building blocks.
//!
//! [`Decoder`] is the state machine; the other types are the pieces it
//! owns: the per-line [`LineHistory`], the [`ColumnThresholds`] table, the
//! black-level [`Baseline`], the [`PixelReconstructor`] and the
//! [`FrameBuffer`] it draws into.
mod baseline;
mod decoder;
mod frame;
mod history;
mod pixel;
mod sync;
mod threshold;

/// Raw red, green and blue samples taken at the same instant.
pub type ColorSample = [i16; 3];

pub use baseline::Baseline;
pub use decoder::{Decoder, DecoderStats};
pub use frame::{BYTES_PER_PIXEL, ColorRange, ColorSpace, Frame, FrameBuffer, PixelFormat};
pub use history::LineHistory;
pub use pixel::{OPAQUE, PixelReconstructor, quantize};
pub use sync::{Edge, LinePhase, SyncEvent};
pub use threshold::ColumnThresholds;
