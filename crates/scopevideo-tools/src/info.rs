use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table, presets::NOTHING};
use scopevideo::acquire::{CaptureSource, Poll, SampleSource};
use scopevideo::{Decoder, Frame, SampleBatch};

use crate::settings::Settings;

const CHANNEL_NAMES: [&str; 4] = ["A", "B", "C", "D"];

/// Running min / max / mean of one channel.
#[derive(Debug, Clone, Copy)]
struct Level {
    min: i16,
    max: i16,
    sum: i64,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            min: i16::MAX,
            max: i16::MIN,
            sum: 0,
        }
    }
}

impl Level {
    fn add(&mut self, values: &[i16]) {
        for &v in values {
            self.min = self.min.min(v);
            self.max = self.max.max(v);
            self.sum += i64::from(v);
        }
    }

    fn mean(&self, count: u64) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.sum as f64 / count as f64
        }
    }
}

/// Summary of a capture, gathered in one pass.
#[derive(Debug, Default)]
pub struct CaptureSummary {
    levels: [Level; 4],
    pub samples: u64,
    pub frames: Vec<(u64, [f64; 3])>,
    pub horizontal_syncs: u64,
    pub frame_boundaries: u64,
    pub frames_suppressed: u64,
}

impl CaptureSummary {
    fn add(&mut self, batch: SampleBatch<'_>) {
        for (channel, level) in self.levels.iter_mut().enumerate() {
            level.add(batch.channel(channel));
        }
        self.samples += batch.len() as u64;
    }
}

/// Scan a capture: per-channel levels plus a full decode.
pub fn summarize(reader: Box<dyn Read + Send>, settings: &Settings) -> Result<CaptureSummary> {
    let mut source = CaptureSource::new(reader);
    let mut decoder = Decoder::new(settings.decoder.clone())?;
    let mut summary = CaptureSummary::default();
    let mut frames: Vec<Frame> = Vec::new();

    source.open(&settings.acquisition)?;
    loop {
        let poll = source.poll(&mut |batch| {
            summary.add(batch);
            decoder.push_batch(batch, &mut frames);
        })?;
        for frame in frames.drain(..) {
            summary.frames.push((frame.timestamp, frame.mean_rgb()));
        }
        if poll == Poll::Finished {
            break;
        }
    }
    source.close()?;

    let stats = decoder.stats();
    summary.horizontal_syncs = stats.horizontal_syncs;
    summary.frame_boundaries = stats.frame_boundaries;
    summary.frames_suppressed = stats.frames_suppressed;
    Ok(summary)
}

/// Print capture statistics as tables.
pub fn info(path: &Path, reader: Box<dyn Read + Send>, settings: &Settings) -> Result<()> {
    let summary = summarize(reader, settings)
        .with_context(|| format!("failed to scan capture: {}", path.display()))?;

    let interval_ns = u64::from(settings.acquisition.sample_interval_ns);
    let duration_ms = (summary.samples * interval_ns) as f64 / 1e6;
    let map = &settings.decoder.channels;
    let role = |channel: usize| {
        if channel == map.sync {
            "sync"
        } else if channel == map.red {
            "red"
        } else if channel == map.green {
            "green"
        } else if channel == map.blue {
            "blue"
        } else {
            "-"
        }
    };

    let mut table = Table::new();
    table.load_preset(NOTHING);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec![Cell::new("File"), Cell::new(path.display().to_string())]);
    table.add_row(vec![Cell::new("Samples"), Cell::new(summary.samples)]);
    table.add_row(vec![
        Cell::new("Duration"),
        Cell::new(format!("{:.3} ms", duration_ms)),
    ]);
    table.add_row(vec![
        Cell::new("Horizontal syncs"),
        Cell::new(summary.horizontal_syncs),
    ]);
    table.add_row(vec![
        Cell::new("Frame boundaries"),
        Cell::new(summary.frame_boundaries),
    ]);
    table.add_row(vec![Cell::new("Frames"), Cell::new(summary.frames.len())]);
    table.add_row(vec![
        Cell::new("Suppressed"),
        Cell::new(summary.frames_suppressed),
    ]);
    println!("{table}");
    println!();

    let mut channels = Table::new();
    channels.load_preset(NOTHING);
    channels.set_content_arrangement(ContentArrangement::Dynamic);
    channels.set_header(vec![
        Cell::new("Channel"),
        Cell::new("Role"),
        Cell::new("Input"),
        Cell::new("Min"),
        Cell::new("Max"),
        Cell::new("Mean"),
    ]);
    for (channel, level) in summary.levels.iter().enumerate().filter(|_| summary.samples > 0) {
        let setup = &settings.acquisition.channels[channel];
        let input = if setup.enabled {
            let (low, high) = setup.input_window();
            format!("{:?} {:.2}..{:.2} V", setup.coupling, low, high)
        } else {
            "off".to_string()
        };
        channels.add_row(vec![
            Cell::new(CHANNEL_NAMES[channel]),
            Cell::new(role(channel)),
            Cell::new(input),
            Cell::new(level.min),
            Cell::new(level.max),
            Cell::new(format!("{:.1}", level.mean(summary.samples))),
        ]);
    }
    println!("{channels}");

    if !summary.frames.is_empty() {
        println!();
        let mut frames = Table::new();
        frames.load_preset(NOTHING);
        frames.set_content_arrangement(ContentArrangement::Dynamic);
        frames.set_header(vec![
            Cell::new("#"),
            Cell::new("Timestamp"),
            Cell::new("Mean R"),
            Cell::new("Mean G"),
            Cell::new("Mean B"),
        ]);
        for (index, (timestamp, rgb)) in summary.frames.iter().enumerate() {
            frames.add_row(vec![
                Cell::new(index),
                Cell::new(timestamp),
                Cell::new(format!("{:.1}", rgb[0])),
                Cell::new(format!("{:.1}", rgb[1])),
                Cell::new(format!("{:.1}", rgb[2])),
            ]);
        }
        println!("{frames}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopevideo::CaptureWriter;
    use scopevideo::synth::TestPattern;

    #[test]
    fn test_summarize_synthetic_capture() {
        let settings = Settings::default();
        let pattern = TestPattern::solid(&settings.decoder, [64, 64, 64]);
        let mut writer = CaptureWriter::new(Vec::<u8>::new());
        writer.write_batch(pattern.render(2).unwrap().as_batch()).unwrap();
        let bytes = writer.finish().unwrap();

        let summary = summarize(Box::new(std::io::Cursor::new(bytes)), &settings).unwrap();
        assert_eq!(summary.samples, pattern.total_samples(2) as u64);
        assert_eq!(summary.frames.len(), 2);
        assert_eq!(summary.frame_boundaries, 3);
        assert_eq!(summary.frames[0].1, [64.0, 64.0, 64.0]);
        assert_eq!(summary.levels[3].min, -6000);
        assert_eq!(summary.levels[3].max, 6000);
    }
}
