//! Synthetic capture generator.
//!
//! Produces a four-channel waveform the decoder locks onto: a short
//! equalizing pulse, then per frame the pre-roll and picture lines followed
//! by another equalizing pulse, and a trailing sync pulse so the last frame
//! is emitted. Color levels are computed backwards from the calibration, so
//! a clean pattern decodes to exactly the colors it was asked for.
//!
//! # Examples
//!
//! ```
//! use scopevideo::{Decoder, DecoderConfig, Frame};
//! use scopevideo::synth::{Fill, TestPattern};
//!
//! let config = DecoderConfig::default();
//! let pattern = TestPattern::with_fill(&config, Fill::Bars(vec![[255, 0, 0], [0, 0, 255]]));
//!
//! let mut decoder = Decoder::new(config).unwrap();
//! let mut frames: Vec<Frame> = Vec::new();
//! decoder.push_batch(pattern.render(1).unwrap().as_batch(), &mut frames);
//!
//! assert_eq!(frames[0].pixel(0, 0), Some([255, 0, 0, 255]));
//! assert_eq!(frames[0].pixel(255, 239), Some([0, 0, 255, 255]));
//! ```
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::acquire::{Poll, SampleSource};
use crate::config::{AcquisitionConfig, ChannelMap, DecoderConfig};
use crate::decode::{Baseline, ColumnThresholds, PixelReconstructor};
use crate::error::{ConfigError, DeviceError};
use crate::sample::{SampleBatch, SampleBuffer};

/// Lines over which the common-mode drift ramps before starting again.
const DRIFT_PERIOD: usize = 256;

/// Picture content of a test pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fill {
    /// Every pixel the same color.
    Solid([u8; 3]),
    /// Equal-width vertical bars, left to right.
    Bars(Vec<[u8; 3]>),
    /// Horizontal ramp from black on the left to the color on the right.
    Ramp([u8; 3]),
}

impl Default for Fill {
    fn default() -> Self {
        Fill::Bars(vec![
            [255, 255, 255],
            [255, 255, 0],
            [0, 255, 255],
            [0, 255, 0],
            [255, 0, 255],
            [255, 0, 0],
            [0, 0, 255],
            [0, 0, 0],
        ])
    }
}

impl Fill {
    /// Color of `column` in a picture `columns` wide.
    pub fn color(&self, column: usize, columns: usize) -> [u8; 3] {
        match self {
            Fill::Solid(rgb) => *rgb,
            Fill::Bars(bars) if bars.is_empty() => [0; 3],
            Fill::Bars(bars) => bars[(column * bars.len() / columns.max(1)).min(bars.len() - 1)],
            Fill::Ramp(rgb) => {
                let span = columns.saturating_sub(1).max(1);
                let column = column.min(span);
                rgb.map(|v| ((usize::from(v) * column + span / 2) / span) as u8)
            }
        }
    }
}

/// Timing and levels of a synthetic capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPattern {
    /// Decoder settings the pattern is generated for.
    pub decoder: DecoderConfig,
    pub fill: Fill,
    /// Samples from one horizontal sync edge to the next.
    pub line_period: usize,
    /// Low samples at the start of every line, including the edge sample.
    pub sync_width: usize,
    pub equalizing_low: usize,
    pub equalizing_high: usize,
    pub sync_low: i16,
    pub sync_high: i16,
    /// Raw color level while no video is sent, red, green, blue.
    pub black: [i16; 3],
    /// Offset added to all color channels per line, ramping over 256 lines.
    pub drift_per_line: i16,
    /// Peak amplitude of uniform noise added to the color channels.
    pub color_noise: i16,
    pub seed: u64,
}

impl Default for TestPattern {
    fn default() -> Self {
        Self {
            decoder: DecoderConfig::default(),
            fill: Fill::default(),
            line_period: 1984,
            sync_width: 147,
            equalizing_low: 74,
            equalizing_high: 120,
            sync_low: -6000,
            sync_high: 6000,
            black: [-9000, -9000, -9000],
            drift_per_line: 0,
            color_noise: 0,
            seed: 0,
        }
    }
}

impl TestPattern {
    /// A single-color pattern for `config`.
    pub fn solid(config: &DecoderConfig, rgb: [u8; 3]) -> Self {
        Self::with_fill(config, Fill::Solid(rgb))
    }

    pub fn with_fill(config: &DecoderConfig, fill: Fill) -> Self {
        Self {
            decoder: config.clone(),
            fill,
            ..Default::default()
        }
    }

    /// Check that the decoder will lock onto the pattern and return its
    /// column table.
    pub fn validate(&self) -> Result<ColumnThresholds, ConfigError> {
        self.decoder.validate()?;
        let thresholds = ColumnThresholds::new(&self.decoder)?;
        let threshold = self.decoder.sync_threshold;
        if self.sync_low >= threshold || self.sync_high < threshold {
            return Err(ConfigError::PatternTiming("sync levels must straddle the sync threshold"));
        }
        if self.sync_width <= self.decoder.baseline_window {
            return Err(ConfigError::PatternTiming("sync pulse shorter than the baseline window"));
        }
        if self.line_period.saturating_sub(self.sync_width) as u64 <= self.decoder.short_pulse_gap {
            return Err(ConfigError::PatternTiming("line video shorter than the short pulse gap"));
        }
        if thresholds.as_slice().last().is_some_and(|&last| last >= self.line_period) {
            return Err(ConfigError::PatternTiming("line ends before the last column"));
        }
        if self.equalizing_low == 0 || self.equalizing_high == 0 {
            return Err(ConfigError::PatternTiming("equalizing pulse needs a low and a high part"));
        }
        if self.equalizing_high as u64 >= self.decoder.short_pulse_gap {
            return Err(ConfigError::PatternTiming("equalizing pulse not shorter than the short pulse gap"));
        }
        Ok(thresholds)
    }

    /// Lines from a frame boundary up to the end of the picture.
    pub fn lines_per_frame(&self) -> usize {
        self.decoder.pre_roll_line.unsigned_abs() as usize + self.decoder.active_lines
    }

    pub fn equalizing_len(&self) -> usize {
        self.equalizing_low + self.equalizing_high
    }

    /// Samples per frame, including its closing equalizing pulse.
    pub fn frame_samples(&self) -> usize {
        self.lines_per_frame() * self.line_period + self.equalizing_len()
    }

    /// Total samples in a capture of `frames` frames.
    pub fn total_samples(&self, frames: usize) -> usize {
        self.equalizing_len() + frames * self.frame_samples() + self.sync_width
    }

    /// Logical index of the falling edge that emits frame `frame`.
    pub fn emission_index(&self, frame: usize) -> u64 {
        (self.equalizing_len() + (frame + 1) * self.frame_samples()) as u64
    }

    /// Raw amount above black that decodes to `rgb`.
    fn levels(&self, rgb: [u8; 3]) -> [i32; 3] {
        let offset = self.decoder.baseline_offset;
        std::array::from_fn(|i| {
            let scaled = f64::from(rgb[i]) / 255.0 * self.decoder.normalization[i];
            (offset + scaled.round()).round() as i32
        })
    }

    /// Pixel the decoder produces for `column` of a clean pattern.
    ///
    /// Exact for solid fills, and for bars and ramps wherever neighboring
    /// columns are at least two samples apart.
    pub fn expected_pixel(&self, column: usize) -> [u8; 4] {
        let rgb = self.fill.color(column, self.decoder.active_columns);
        let levels = self.levels(rgb);
        let sample = std::array::from_fn(|i| saturate(i32::from(self.black[i]) + levels[i]));
        let window = self.decoder.baseline_window;
        let baseline = Baseline(std::array::from_fn(|i| {
            let sum = i64::from(self.black[i]) * window as i64;
            -(sum as f64) / window as f64 - self.decoder.baseline_offset
        }));
        PixelReconstructor::new(self.decoder.normalization).flat(sample, &baseline)
    }

    /// Lazily generate a capture of `frames` frames.
    pub fn waveform(&self, frames: usize) -> Result<Waveform, ConfigError> {
        let thresholds = self.validate()?;
        let columns = self.decoder.active_columns;
        let video = (0..self.line_period)
            .map(|position| {
                if position < self.sync_width {
                    return [0; 3];
                }
                // Slot in the decoder's line history; the edge sample is not stored.
                let slot = position - 1;
                let column = thresholds
                    .as_slice()
                    .partition_point(|&t| t - 2 <= slot)
                    .saturating_sub(1);
                self.levels(self.fill.color(column, columns))
            })
            .collect();

        Ok(Waveform {
            channels: self.decoder.channels,
            sync_low: self.sync_low,
            sync_high: self.sync_high,
            black: self.black.map(i32::from),
            drift_per_line: i32::from(self.drift_per_line),
            color_noise: i32::from(self.color_noise.max(0)),
            rng: StdRng::seed_from_u64(self.seed),
            line_period: self.line_period,
            sync_width: self.sync_width,
            equalizing_low: self.equalizing_low,
            equalizing_len: self.equalizing_len(),
            pre_roll_line: self.decoder.pre_roll_line,
            active_lines: self.decoder.active_lines,
            lines_per_frame: self.lines_per_frame(),
            video,
            segments: 2 + frames * (self.lines_per_frame() + 1),
            segment: 0,
            position: 0,
            remaining: self.total_samples(frames),
        })
    }

    /// Generate a whole capture in memory.
    pub fn render(&self, frames: usize) -> Result<SampleBuffer, ConfigError> {
        Ok(self.waveform(frames)?.collect())
    }
}

fn saturate(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}

#[derive(Debug, Clone, Copy)]
enum Segment {
    Equalizing,
    Line(i32),
    Tail,
}

/// Sample iterator over a synthetic capture.
#[derive(Debug, Clone)]
pub struct Waveform {
    channels: ChannelMap,
    sync_low: i16,
    sync_high: i16,
    black: [i32; 3],
    drift_per_line: i32,
    color_noise: i32,
    rng: StdRng,
    line_period: usize,
    sync_width: usize,
    equalizing_low: usize,
    equalizing_len: usize,
    pre_roll_line: i32,
    active_lines: usize,
    lines_per_frame: usize,
    /// Amount above black at every position of a picture line.
    video: Vec<[i32; 3]>,
    segments: usize,
    segment: usize,
    position: usize,
    remaining: usize,
}

impl Waveform {
    fn segment_kind(&self, segment: usize) -> Segment {
        if segment == 0 {
            return Segment::Equalizing;
        }
        if segment + 1 == self.segments {
            return Segment::Tail;
        }
        let within = (segment - 1) % (self.lines_per_frame + 1);
        if within < self.lines_per_frame {
            Segment::Line(self.pre_roll_line + within as i32)
        } else {
            Segment::Equalizing
        }
    }

    fn segment_len(&self, kind: Segment) -> usize {
        match kind {
            Segment::Equalizing => self.equalizing_len,
            Segment::Line(_) => self.line_period,
            Segment::Tail => self.sync_width,
        }
    }

    fn sample(&mut self, kind: Segment, position: usize) -> [i16; 4] {
        let (low, video) = match kind {
            Segment::Equalizing => (position < self.equalizing_low, None),
            Segment::Tail => (true, None),
            Segment::Line(line) => {
                let low = position < self.sync_width;
                let active = line >= 0 && (line as usize) < self.active_lines;
                (low, (active && !low).then(|| self.video[position]))
            }
        };
        let drift = self.drift_per_line * (self.segment % DRIFT_PERIOD) as i32;

        let mut out = [0i16; 4];
        out[self.channels.sync] = if low { self.sync_low } else { self.sync_high };
        for (i, channel) in self.channels.colors().into_iter().enumerate() {
            let mut value = self.black[i] + drift + video.map_or(0, |v| v[i]);
            if self.color_noise > 0 {
                value += self.rng.gen_range(-self.color_noise..=self.color_noise);
            }
            out[channel] = saturate(value);
        }
        out
    }
}

impl Iterator for Waveform {
    type Item = [i16; 4];

    fn next(&mut self) -> Option<Self::Item> {
        while self.segment < self.segments {
            let kind = self.segment_kind(self.segment);
            if self.position < self.segment_len(kind) {
                let position = self.position;
                self.position += 1;
                self.remaining -= 1;
                return Some(self.sample(kind, position));
            }
            self.segment += 1;
            self.position = 0;
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Waveform {}

/// A [`SampleSource`] streaming a [`TestPattern`].
///
/// Batch sizes cycle through a configurable list, capped by the acquisition
/// buffer, so decoders see frames split at arbitrary points.
pub struct SyntheticSource {
    pattern: TestPattern,
    frames: usize,
    batch_sizes: Vec<usize>,
    next_batch: usize,
    buffer_samples: usize,
    waveform: Option<Waveform>,
    buffer: SampleBuffer,
}

impl SyntheticSource {
    pub fn new(pattern: TestPattern, frames: usize) -> Self {
        Self {
            pattern,
            frames,
            batch_sizes: vec![crate::acquire::DEFAULT_BATCH_SAMPLES],
            next_batch: 0,
            buffer_samples: usize::MAX,
            waveform: None,
            buffer: SampleBuffer::default(),
        }
    }

    /// Deliver batches of these sizes in turn. Zero sizes are skipped.
    pub fn with_batch_sizes(mut self, sizes: &[usize]) -> Self {
        let sizes: Vec<usize> = sizes.iter().copied().filter(|&s| s > 0).collect();
        if !sizes.is_empty() {
            self.batch_sizes = sizes;
        }
        self
    }
}

impl SampleSource for SyntheticSource {
    fn open(&mut self, config: &AcquisitionConfig) -> Result<(), DeviceError> {
        let waveform = self
            .pattern
            .waveform(self.frames)
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;
        crate::acquire::log_setup(config);
        self.waveform = Some(waveform);
        self.buffer_samples = config.buffer_samples.max(1);
        self.next_batch = 0;
        Ok(())
    }

    fn poll(&mut self, deliver: &mut dyn FnMut(SampleBatch<'_>)) -> Result<Poll, DeviceError> {
        let size = self.batch_sizes[self.next_batch % self.batch_sizes.len()].min(self.buffer_samples);
        let Some(waveform) = self.waveform.as_mut() else {
            return Err(DeviceError::Stream("synthetic source polled before open".to_string()));
        };
        self.next_batch += 1;

        self.buffer.clear();
        for sample in waveform.by_ref().take(size) {
            self.buffer.push(sample);
        }
        if self.buffer.is_empty() {
            return Ok(Poll::Finished);
        }
        deliver(self.buffer.as_batch());
        Ok(Poll::Delivered(self.buffer.len()))
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.waveform = None;
        Ok(())
    }
}
