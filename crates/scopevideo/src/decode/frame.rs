//! Frame storage and the frames handed to sinks.
use serde::{Deserialize, Serialize};

/// Bytes per packed pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Pixel layout of emitted frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Packed 8-bit red, green, blue, alpha.
    Rgba8,
}

/// Color space the calibration targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Bt601,
}

/// Quantization range of the pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorRange {
    Full,
}

/// The picture being written by the decoder.
///
/// Pixels not reached on a line keep the value they had in the previous
/// frame, which hides short dropouts instead of flashing black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    data: Box<[u8]>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * BYTES_PER_PIXEL].into_boxed_slice(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn put(&mut self, line: usize, column: usize, pixel: [u8; 4]) {
        let offset = (line * self.width + column) * BYTES_PER_PIXEL;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&pixel);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Copy the current picture out as an owned frame.
    pub fn snapshot(&self, timestamp: u64) -> Frame {
        Frame {
            width: self.width as u32,
            height: self.height as u32,
            timestamp,
            format: PixelFormat::Rgba8,
            color_space: ColorSpace::Bt601,
            range: ColorRange::Full,
            data: self.data.to_vec(),
        }
    }
}

/// A completed frame, owned by whoever receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Logical index of the frame boundary, right-shifted by the configured
    /// timestamp shift. Non-decreasing within a session.
    pub timestamp: u64,
    pub format: PixelFormat,
    pub color_space: ColorSpace,
    pub range: ColorRange,
    /// Row-major pixel data, `stride() * height` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// The pixel at (`x`, `y`), or `None` when outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        Some(pixel)
    }

    /// Iterate over all pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 4]> + '_ {
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Mean red, green and blue over the whole frame.
    pub fn mean_rgb(&self) -> [f64; 3] {
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for pixel in self.pixels() {
            for (sum, value) in sums.iter_mut().zip(&pixel[..3]) {
                *sum += u64::from(*value);
            }
            count += 1;
        }
        if count == 0 {
            return [0.0; 3];
        }
        sums.map(|s| s as f64 / count as f64)
    }
}
