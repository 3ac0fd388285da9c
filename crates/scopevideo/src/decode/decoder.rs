//! The sync and timing state machine.
//!
//! `Decoder` consumes four-channel samples in logical index order and keeps
//! all of its state in fixed-size buffers allocated up front. Per sample it
//!
//! - looks for a crossing of the sync threshold,
//! - on a falling edge, closes the line (or the frame, when the edge follows
//!   the last rising edge too closely),
//! - otherwise records the color samples of an active line and, when the
//!   sample count reaches the next column threshold, writes that pixel,
//! - on a rising edge, re-measures the black level of the line.
//!
//! Noise on the sync channel can only cost frames: the line counter is
//! re-anchored at every frame boundary, and frames are only emitted when the
//! boundary arrives after a full set of picture lines.
use std::ops::Range;

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::DecoderConfig;
use crate::decode::baseline::Baseline;
use crate::decode::frame::FrameBuffer;
use crate::decode::history::LineHistory;
use crate::decode::pixel::PixelReconstructor;
use crate::decode::sync::{Edge, LinePhase, SyncEvent};
use crate::decode::threshold::ColumnThresholds;
use crate::error::Result;
use crate::sample::SampleBatch;
use crate::sink::FrameSink;

/// Running counters, cheap enough to update on every transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Samples consumed since start or the last reset.
    pub samples: u64,
    pub batches: u64,
    pub horizontal_syncs: u64,
    pub frame_boundaries: u64,
    pub frames_emitted: u64,
    /// Frame boundaries that arrived outside the emission window.
    pub frames_suppressed: u64,
}

/// Streaming decoder state.
///
/// # Examples
///
/// ```
/// use scopevideo::{Decoder, DecoderConfig, Frame};
/// use scopevideo::synth::TestPattern;
///
/// let config = DecoderConfig::default();
/// let pattern = TestPattern::solid(&config, [128, 64, 32]);
/// let samples = pattern.render(1).unwrap();
///
/// let mut decoder = Decoder::new(config).unwrap();
/// let mut frames: Vec<Frame> = Vec::new();
/// decoder.push_batch(samples.as_batch(), &mut frames);
///
/// assert_eq!(frames.len(), 1);
/// assert!(frames[0].pixels().all(|p| p == [128, 64, 32, 255]));
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
    emission: Range<i32>,
    thresholds: ColumnThresholds,
    reconstructor: PixelReconstructor,
    history: LineHistory,
    frame: FrameBuffer,

    total_samples: u64,
    previous_sync_sample: i16,
    previous_rising_index: Option<u64>,
    line_number: i32,
    column_index: usize,
    samples_in_line: usize,
    baseline: Baseline,

    stats: DecoderStats,
}

impl Decoder {
    /// Create a decoder, validating `config` and building the column table.
    pub fn new(config: DecoderConfig) -> Result<Self> {
        config.validate()?;
        let thresholds = ColumnThresholds::new(&config)?;
        Ok(Self {
            emission: config.emission_window(),
            thresholds,
            reconstructor: PixelReconstructor::new(config.normalization),
            history: LineHistory::new(config.history_capacity),
            frame: FrameBuffer::new(config.active_columns, config.active_lines),
            total_samples: 0,
            previous_sync_sample: i16::MAX,
            previous_rising_index: None,
            line_number: config.frame_guard_line,
            column_index: 0,
            samples_in_line: 0,
            baseline: Baseline::default(),
            stats: DecoderStats::default(),
            config,
        })
    }

    /// Return to the freshly constructed state.
    ///
    /// Use this when the logical sample index restarts from zero, for
    /// example after the device stream is restarted.
    pub fn reset(&mut self) {
        self.history.clear();
        self.frame.clear();
        self.total_samples = 0;
        self.previous_sync_sample = i16::MAX;
        self.previous_rising_index = None;
        self.line_number = self.config.frame_guard_line;
        self.column_index = 0;
        self.samples_in_line = 0;
        self.baseline = Baseline::default();
        self.stats = DecoderStats::default();
        debug!("decoder reset");
    }

    /// Feed the next batch of samples.
    ///
    /// The batch continues the logical sample index where the previous one
    /// stopped. Completed frames are passed to `sink` as they are found, so a
    /// single batch may produce zero, one or several frames.
    pub fn push_batch<S>(&mut self, batch: SampleBatch<'_>, sink: &mut S)
    where
        S: FrameSink + ?Sized,
    {
        let start = self.total_samples;
        for offset in 0..batch.len() {
            self.step(batch.sample(offset), start + offset as u64, sink);
        }
        self.total_samples += batch.len() as u64;
        self.stats.samples = self.total_samples;
        self.stats.batches += 1;
    }

    #[inline]
    fn step<S>(&mut self, sample: [i16; 4], index: u64, sink: &mut S)
    where
        S: FrameSink + ?Sized,
    {
        let sync = sample[self.config.channels.sync];
        let edge = Edge::detect(self.previous_sync_sample, sync, self.config.sync_threshold);
        self.previous_sync_sample = sync;

        if edge == Some(Edge::Falling) {
            self.on_falling(index, sink);
            return;
        }
        if self.samples_in_line >= self.history.capacity() {
            return;
        }

        let phase = self.phase();
        if phase.active_line().is_some() {
            let [red, green, blue] = self.config.channels.colors();
            self.history
                .store(self.samples_in_line, [sample[red], sample[green], sample[blue]]);
        }
        self.samples_in_line += 1;

        match (edge, phase) {
            (Some(Edge::Rising), _) => self.on_rising(index, phase),
            (None, LinePhase::LineActive(line)) => self.advance_column(line),
            _ => {}
        }
    }

    fn on_falling<S>(&mut self, index: u64, sink: &mut S)
    where
        S: FrameSink + ?Sized,
    {
        match SyncEvent::classify(index, self.previous_rising_index, self.config.short_pulse_gap) {
            SyncEvent::FrameBoundary => {
                self.stats.frame_boundaries += 1;
                if self.emission.contains(&self.line_number) {
                    self.emit(index, sink);
                } else {
                    self.stats.frames_suppressed += 1;
                    trace!(
                        line = self.line_number,
                        index,
                        "frame boundary outside emission window"
                    );
                }
                self.line_number = self.config.pre_roll_line;
            }
            SyncEvent::Horizontal => {
                self.stats.horizontal_syncs += 1;
                self.line_number = self.line_number.saturating_add(1);
            }
        }
        self.column_index = 0;
        self.samples_in_line = 0;
    }

    fn on_rising(&mut self, index: u64, phase: LinePhase) {
        if phase.active_line().is_some() {
            // The rising-edge sample is the first of the video; measure the
            // samples before it.
            let preceding = self.samples_in_line - 1;
            if let Some(baseline) = Baseline::measure(
                &self.history,
                preceding,
                self.config.baseline_window,
                self.config.baseline_offset,
            ) {
                self.baseline = baseline;
            }
        }
        self.previous_rising_index = Some(index);
    }

    #[inline]
    fn advance_column(&mut self, line: usize) {
        if self.thresholds.get(self.column_index) != Some(self.samples_in_line) {
            return;
        }
        let pixel = self
            .reconstructor
            .reconstruct(&self.history, self.samples_in_line, &self.baseline);
        self.frame.put(line, self.column_index, pixel);
        self.column_index += 1;
    }

    fn emit<S>(&mut self, index: u64, sink: &mut S)
    where
        S: FrameSink + ?Sized,
    {
        let timestamp = index >> self.config.timestamp_shift;
        sink.deliver_frame(self.frame.snapshot(timestamp));
        self.stats.frames_emitted += 1;
        debug!(
            timestamp,
            index,
            frames = self.stats.frames_emitted,
            "frame emitted"
        );
    }

    /// Current position within the frame.
    pub fn phase(&self) -> LinePhase {
        LinePhase::of(self.line_number, self.config.active_lines, &self.emission)
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn line_number(&self) -> i32 {
        self.line_number
    }

    pub fn column_index(&self) -> usize {
        self.column_index
    }

    pub fn samples_in_line(&self) -> usize {
        self.samples_in_line
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn thresholds(&self) -> &ColumnThresholds {
        &self.thresholds
    }

    /// The picture currently being drawn.
    pub fn frame_buffer(&self) -> &FrameBuffer {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Frame;
    use crate::sample::SampleBuffer;

    const HIGH: i16 = 1000;
    const LOW: i16 = -1000;

    /// Small geometry: 2 lines of 3 columns at offsets 10, 12, 14.
    fn tiny_config() -> DecoderConfig {
        DecoderConfig {
            active_columns: 3,
            active_lines: 2,
            pre_roll_line: 0,
            frame_guard_line: 10,
            history_capacity: 64,
            baseline_window: 2,
            baseline_offset: 0.0,
            short_pulse_gap: 8,
            column_slope: 2.0,
            column_intercept: 10.0,
            normalization: [255.0, 255.0, 255.0],
            ..Default::default()
        }
    }

    fn sample(sync: i16, value: i16) -> [i16; 4] {
        // Default map: blue = 0, red = 1, green = 2, sync = 3.
        [value, value, value, sync]
    }

    fn push(decoder: &mut Decoder, samples: &[[i16; 4]]) -> Vec<Frame> {
        let buffer: SampleBuffer = samples.iter().copied().collect();
        let mut frames = Vec::new();
        decoder.push_batch(buffer.as_batch(), &mut frames);
        frames
    }

    /// A line: `sync_len` low samples at `black`, then video at `level`.
    fn line(sync_len: usize, total: usize, black: i16, level: i16) -> Vec<[i16; 4]> {
        (0..total)
            .map(|i| if i < sync_len { sample(LOW, black) } else { sample(HIGH, level) })
            .collect()
    }

    /// A short pulse pair: low, high for fewer samples than the gap.
    fn equalizing() -> Vec<[i16; 4]> {
        let mut samples = vec![sample(LOW, 0); 2];
        samples.extend(vec![sample(HIGH, 0); 4]);
        samples
    }

    #[test]
    fn test_starts_unlocked() {
        let decoder = Decoder::new(tiny_config()).unwrap();
        assert_eq!(decoder.phase(), LinePhase::Unlocked);
        assert_eq!(decoder.line_number(), 10);
    }

    #[test]
    fn test_first_low_sample_is_a_falling_edge() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        push(&mut decoder, &[sample(LOW, 0)]);
        assert_eq!(decoder.stats().horizontal_syncs, 1);
        assert_eq!(decoder.line_number(), 11);
        assert_eq!(decoder.samples_in_line(), 0);
    }

    #[test]
    fn test_boundary_anchors_pre_roll_without_emitting() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let frames = push(&mut decoder, &[equalizing(), vec![sample(LOW, 0)]].concat());
        assert!(frames.is_empty());
        assert_eq!(decoder.stats().frame_boundaries, 1);
        assert_eq!(decoder.stats().frames_suppressed, 1);
        assert_eq!(decoder.phase(), LinePhase::LineActive(0));
    }

    #[test]
    fn test_full_frame_decodes_levels() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        // Boundary line is picture line 0 (pre-roll of zero lines).
        samples.extend(line(4, 20, 50, 150));
        samples.extend(line(4, 20, 50, 150));
        samples.extend(equalizing());
        samples.push(sample(LOW, 0));

        let frames = push(&mut decoder, &samples);
        assert_eq!(frames.len(), 1);
        let frame = &frames[0];
        assert_eq!((frame.width, frame.height), (3, 2));
        // (150 - 50) / 255 * 255 = 100
        assert!(frame.pixels().all(|p| p == [100, 100, 100, 255]));
        assert_eq!(decoder.baseline(), Baseline([-50.0, -50.0, -50.0]));
    }

    #[test]
    fn test_column_filter_weights_threshold_sample_twice() {
        // Slots 7..=9 lead up to the first column threshold (10).
        let level = |slot: usize| match slot {
            7 => 255,
            8 => 0,
            9 => 90,
            _ => 30,
        };
        let picture_line: Vec<[i16; 4]> = (0..20)
            .map(|i| if i < 4 { sample(LOW, 0) } else { sample(HIGH, level(i - 1)) })
            .collect();

        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        samples.extend(picture_line.iter().copied());
        samples.extend(picture_line.iter().copied());
        samples.extend(equalizing());
        samples.push(sample(LOW, 0));

        let frames = push(&mut decoder, &samples);
        assert_eq!(frames.len(), 1);
        for y in 0..2 {
            // (2 * 90 + 0) / 3, the sample three back does not count.
            assert_eq!(frames[0].pixel(0, y), Some([60, 60, 60, 255]));
            assert_eq!(frames[0].pixel(1, y), Some([30, 30, 30, 255]));
            assert_eq!(frames[0].pixel(2, y), Some([30, 30, 30, 255]));
        }
    }

    #[test]
    fn test_timestamp_is_shifted_boundary_index() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        samples.extend(line(4, 20, 0, 0));
        samples.extend(line(4, 20, 0, 0));
        samples.extend(equalizing());
        let boundary_index = samples.len() as u64;
        samples.push(sample(LOW, 0));

        let frames = push(&mut decoder, &samples);
        assert_eq!(frames[0].timestamp, boundary_index >> 6);
    }

    #[test]
    fn test_column_index_never_exceeds_width() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        samples.extend(line(4, 60, 0, 0));
        push(&mut decoder, &samples);
        assert_eq!(decoder.phase(), LinePhase::LineActive(0));
        assert_eq!(decoder.column_index(), 3);
    }

    #[test]
    fn test_line_samples_saturate_at_capacity() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        samples.extend(line(4, 200, 0, 0));
        push(&mut decoder, &samples);
        assert_eq!(decoder.samples_in_line(), 64);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut decoder = Decoder::new(tiny_config()).unwrap();
        let mut samples = equalizing();
        samples.extend(line(4, 20, 10, 90));
        push(&mut decoder, &samples);
        assert_ne!(decoder.total_samples(), 0);

        decoder.reset();
        assert_eq!(decoder.total_samples(), 0);
        assert_eq!(decoder.phase(), LinePhase::Unlocked);
        assert_eq!(decoder.stats(), DecoderStats::default());
        assert_eq!(decoder.baseline(), Baseline::default());
        assert!(decoder.frame_buffer().as_bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DecoderConfig {
            active_columns: 0,
            ..Default::default()
        };
        assert!(Decoder::new(config).is_err());
    }
}
