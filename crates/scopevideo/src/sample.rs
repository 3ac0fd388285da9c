//! Four-channel sample batches.
//!
//! Acquisition devices fill one buffer per channel, so batches are planar:
//! a [`SampleBatch`] borrows four equally long slices and sample `i` is the
//! tuple of the four values at `i`. [`SampleBuffer`] is the owned
//! counterpart sources register with the device and slice batches from.
use crate::config::CHANNEL_COUNT;
use crate::error::{Error, Result};

/// A borrowed, gapless run of four-channel samples.
#[derive(Debug, Clone, Copy)]
pub struct SampleBatch<'a> {
    channels: [&'a [i16]; CHANNEL_COUNT],
}

impl<'a> SampleBatch<'a> {
    /// Build a batch from per-channel slices.
    ///
    /// Returns `Error::BatchShape` when the slices differ in length.
    ///
    /// # Examples
    ///
    /// ```
    /// use scopevideo::SampleBatch;
    ///
    /// let a: [i16; 3] = [1, 2, 3];
    /// let b: [i16; 3] = [4, 5, 6];
    /// let c: [i16; 3] = [7, 8, 9];
    /// let d: [i16; 3] = [-1, 0, 1];
    /// let batch = SampleBatch::new([&a[..], &b[..], &c[..], &d[..]]).unwrap();
    /// assert_eq!(batch.len(), 3);
    /// assert_eq!(batch.sample(1), [2, 5, 8, 0]);
    /// ```
    pub fn new(channels: [&'a [i16]; CHANNEL_COUNT]) -> Result<Self> {
        let expected = channels[0].len();
        for (channel, slice) in channels.iter().enumerate().skip(1) {
            if slice.len() != expected {
                return Err(Error::BatchShape {
                    channel,
                    expected,
                    got: slice.len(),
                });
            }
        }
        Ok(Self { channels })
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All four channel values at position `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    #[inline]
    pub fn sample(&self, index: usize) -> [i16; CHANNEL_COUNT] {
        [
            self.channels[0][index],
            self.channels[1][index],
            self.channels[2][index],
            self.channels[3][index],
        ]
    }

    /// The raw slice of one channel.
    pub fn channel(&self, channel: usize) -> &'a [i16] {
        self.channels[channel]
    }

    /// Iterate over the samples in order.
    pub fn iter(&self) -> impl Iterator<Item = [i16; CHANNEL_COUNT]> + '_ {
        (0..self.len()).map(move |i| self.sample(i))
    }

    /// A sub-batch covering `start..start + len`.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn slice(&self, start: usize, len: usize) -> SampleBatch<'a> {
        SampleBatch {
            channels: self.channels.map(|c| &c[start..start + len]),
        }
    }
}

/// Owned planar storage for four channels.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    channels: [Vec<i16>; CHANNEL_COUNT],
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| Vec::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
    }

    /// Append one sample across all channels.
    #[inline]
    pub fn push(&mut self, sample: [i16; CHANNEL_COUNT]) {
        for (channel, value) in self.channels.iter_mut().zip(sample) {
            channel.push(value);
        }
    }

    /// View the whole buffer as a batch.
    pub fn as_batch(&self) -> SampleBatch<'_> {
        SampleBatch {
            channels: [
                self.channels[0].as_slice(),
                self.channels[1].as_slice(),
                self.channels[2].as_slice(),
                self.channels[3].as_slice(),
            ],
        }
    }
}

impl FromIterator<[i16; CHANNEL_COUNT]> for SampleBuffer {
    fn from_iter<T: IntoIterator<Item = [i16; CHANNEL_COUNT]>>(iter: T) -> Self {
        let mut buffer = SampleBuffer::default();
        for sample in iter {
            buffer.push(sample);
        }
        buffer
    }
}
