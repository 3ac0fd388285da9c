//! Raw sample captures.
//!
//! A capture is a headerless stream of little-endian `i16` quadruples in
//! device channel order A, B, C, D. Compression, if any, is left to the
//! reader or writer handed in.
use std::io::{self, ErrorKind, Read, Write};

use tracing::{debug, warn};

use crate::acquire::source::{Poll, SampleSource, log_setup};
use crate::config::{AcquisitionConfig, CHANNEL_COUNT};
use crate::error::DeviceError;
use crate::sample::{SampleBatch, SampleBuffer};

/// Size of one four-channel sample on disk.
pub const BYTES_PER_SAMPLE: usize = CHANNEL_COUNT * 2;

/// Samples per delivered batch unless configured otherwise.
pub const DEFAULT_BATCH_SAMPLES: usize = 65_536;

/// Replays a raw capture through the [`SampleSource`] interface.
///
/// Every poll delivers one batch of up to `batch_samples` samples, capped by
/// the acquisition buffer size. A trailing partial sample is discarded.
///
/// # Examples
///
/// ```
/// use scopevideo::AcquisitionConfig;
/// use scopevideo::acquire::{CaptureSource, Poll, SampleSource};
///
/// // Two samples: A=1 B=2 C=3 D=-1, then A=4 B=5 C=6 D=-2.
/// let bytes: Vec<u8> = [1i16, 2, 3, -1, 4, 5, 6, -2]
///     .iter()
///     .flat_map(|v| v.to_le_bytes())
///     .collect();
///
/// let mut source = CaptureSource::new(&bytes[..]);
/// source.open(&AcquisitionConfig::default()).unwrap();
/// let mut seen = Vec::new();
/// let poll = source.poll(&mut |batch| seen.extend(batch.iter())).unwrap();
/// assert_eq!(poll, Poll::Delivered(2));
/// assert_eq!(seen, vec![[1, 2, 3, -1], [4, 5, 6, -2]]);
/// assert_eq!(source.poll(&mut |_| {}).unwrap(), Poll::Finished);
/// ```
pub struct CaptureSource<R> {
    reader: R,
    batch_samples: usize,
    raw: Vec<u8>,
    buffer: SampleBuffer,
    opened: bool,
    exhausted: bool,
    delivered: u64,
}

impl<R: Read + Send> CaptureSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_batch_samples(reader, DEFAULT_BATCH_SAMPLES)
    }

    pub fn with_batch_samples(reader: R, batch_samples: usize) -> Self {
        Self {
            reader,
            batch_samples: batch_samples.max(1),
            raw: Vec::new(),
            buffer: SampleBuffer::default(),
            opened: false,
            exhausted: false,
            delivered: 0,
        }
    }

    /// Samples delivered since `open`.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Read until `raw` is full or the reader reports end of stream.
    fn fill(&mut self) -> io::Result<usize> {
        let mut filled = 0;
        while filled < self.raw.len() {
            match self.reader.read(&mut self.raw[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Send> SampleSource for CaptureSource<R> {
    fn open(&mut self, config: &AcquisitionConfig) -> Result<(), DeviceError> {
        let samples = self.batch_samples.min(config.buffer_samples.max(1));
        self.raw = vec![0; samples * BYTES_PER_SAMPLE];
        self.buffer = SampleBuffer::with_capacity(samples);
        self.opened = true;
        self.exhausted = false;
        self.delivered = 0;
        log_setup(config);
        debug!(batch_samples = samples, "capture opened");
        Ok(())
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(SampleBatch<'_>)) -> Result<Poll, DeviceError> {
        if !self.opened {
            return Err(DeviceError::Stream("capture polled before open".to_string()));
        }
        if self.exhausted {
            return Ok(Poll::Finished);
        }

        let filled = self.fill()?;
        if filled < self.raw.len() {
            self.exhausted = true;
            let trailing = filled % BYTES_PER_SAMPLE;
            if trailing != 0 {
                warn!(bytes = trailing, "capture ends with a partial sample, ignored");
            }
        }

        self.buffer.clear();
        for chunk in self.raw[..filled].chunks_exact(BYTES_PER_SAMPLE) {
            self.buffer.push(std::array::from_fn(|channel| {
                i16::from_le_bytes([chunk[channel * 2], chunk[channel * 2 + 1]])
            }));
        }
        if self.buffer.is_empty() {
            return Ok(Poll::Finished);
        }

        deliver(self.buffer.as_batch());
        self.delivered += self.buffer.len() as u64;
        Ok(Poll::Delivered(self.buffer.len()))
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.opened {
            debug!(samples = self.delivered, "capture closed");
        }
        self.opened = false;
        Ok(())
    }
}

/// Writes samples in the raw capture format.
pub struct CaptureWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn write_sample(&mut self, sample: [i16; CHANNEL_COUNT]) -> io::Result<()> {
        let mut bytes = [0u8; BYTES_PER_SAMPLE];
        for (chunk, value) in bytes.chunks_exact_mut(2).zip(sample) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        self.writer.write_all(&bytes)?;
        self.written += 1;
        Ok(())
    }

    pub fn write_batch(&mut self, batch: SampleBatch<'_>) -> io::Result<()> {
        for sample in batch.iter() {
            self.write_sample(sample)?;
        }
        Ok(())
    }

    /// Samples written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(samples: &[[i16; 4]]) -> Vec<u8> {
        let mut writer = CaptureWriter::new(Vec::<u8>::new());
        for &sample in samples {
            writer.write_sample(sample).unwrap();
        }
        assert_eq!(writer.written(), samples.len() as u64);
        writer.finish().unwrap()
    }

    #[test]
    fn test_writer_layout_is_little_endian_abcd() {
        let bytes = encode(&[[1, -2, 0x0304, i16::MIN]]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xfe, 0xff, 0x04, 0x03, 0x00, 0x80]);
    }

    #[test]
    fn test_source_splits_into_batches() {
        let samples: Vec<[i16; 4]> = (0..10).map(|i| [i, i, i, -i]).collect();
        let bytes = encode(&samples);
        let mut source = CaptureSource::with_batch_samples(&bytes[..], 4);
        source.open(&AcquisitionConfig::default()).unwrap();

        let mut sizes = Vec::new();
        let mut seen = Vec::new();
        loop {
            match source
                .poll(&mut |batch| {
                    sizes.push(batch.len());
                    seen.extend(batch.iter());
                })
                .unwrap()
            {
                Poll::Finished => break,
                Poll::Delivered(_) | Poll::Idle => {}
            }
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(seen, samples);
        assert_eq!(source.delivered(), 10);
        source.close().unwrap();
    }

    #[test]
    fn test_batch_capped_by_acquisition_buffer() {
        let bytes = encode(&[[0; 4]; 8]);
        let mut source = CaptureSource::with_batch_samples(&bytes[..], 100);
        let config = AcquisitionConfig {
            buffer_samples: 3,
            ..Default::default()
        };
        source.open(&config).unwrap();
        assert_eq!(source.poll(&mut |_| {}).unwrap(), Poll::Delivered(3));
    }

    #[test]
    fn test_trailing_partial_sample_ignored() {
        let mut bytes = encode(&[[7, 7, 7, 7]]);
        bytes.extend_from_slice(&[1, 2, 3]);
        let mut source = CaptureSource::new(&bytes[..]);
        source.open(&AcquisitionConfig::default()).unwrap();
        assert_eq!(source.poll(&mut |_| {}).unwrap(), Poll::Delivered(1));
        assert_eq!(source.poll(&mut |_| {}).unwrap(), Poll::Finished);
    }

    #[test]
    fn test_poll_before_open_fails() {
        let mut source = CaptureSource::new(io::empty());
        assert!(matches!(
            source.poll(&mut |_| {}),
            Err(DeviceError::Stream(_))
        ));
        assert!(source.close().is_ok());
    }
}
