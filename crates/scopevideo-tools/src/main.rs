use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use scopevideo::acquire::{CaptureSource, Poll, SampleSource};
use scopevideo::synth::Fill;
use scopevideo::{CaptureWriter, ChannelSink, Decoder, Frame, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod capture;
mod info;
mod render;
mod settings;

use capture::{create_capture, open_capture};
use settings::Settings;

/// scopevideo command line tools
#[derive(Parser)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None
)]
struct Cli {
    /// JSON file overriding decoder, acquisition and pattern settings
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum FillKind {
    Bars,
    Ramp,
    Solid,
}

#[derive(Subcommand)]
enum Commands {
    /// Show channel levels and decoding statistics for a raw capture (use '-' for stdin)
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Decode a raw capture and write every frame as a PNG
    Decode {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Output directory, created if missing
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
        /// Stop after this many frames
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode a raw capture on a worker session and print frames as they arrive
    Watch {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Frames queued between the decoder and this printer
        #[arg(long, default_value_t = 4)]
        queue: usize,
    },
    /// Write a synthetic raw capture (.gz compresses; '-' for stdout)
    Synth {
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
        #[arg(long, default_value_t = 4)]
        frames: usize,
        #[arg(long, value_enum, default_value_t = FillKind::Bars)]
        fill: FillKind,
        /// Color for solid and ramp fills, as R,G,B
        #[arg(long, value_delimiter = ',', default_values_t = [255u8, 255, 255])]
        color: Vec<u8>,
        /// Common-mode drift added per line, in raw counts
        #[arg(long)]
        drift: Option<i16>,
        /// Uniform noise amplitude on the color channels, in raw counts
        #[arg(long)]
        noise: Option<i16>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the effective settings as JSON
    PrintConfig,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn decode(file: &Path, out: &Path, limit: Option<usize>, settings: &Settings) -> Result<()> {
    fs::create_dir_all(out)
        .with_context(|| format!("failed to create output directory: {}", out.display()))?;

    let mut source = CaptureSource::new(open_capture(file)?);
    let mut decoder = Decoder::new(settings.decoder.clone())?;
    let mut pending: Vec<Frame> = Vec::new();
    let mut written = 0usize;
    let limit = limit.unwrap_or(usize::MAX);

    source.open(&settings.acquisition)?;
    while written < limit {
        let poll = source.poll(&mut |batch| decoder.push_batch(batch, &mut pending))?;
        for frame in pending.drain(..) {
            if written == limit {
                break;
            }
            let path = render::frame_path(out, written);
            render::save_png(&frame, &path)?;
            info!(path = %path.display(), timestamp = frame.timestamp, "frame written");
            written += 1;
        }
        if poll == Poll::Finished {
            break;
        }
    }
    source.close()?;

    let stats = decoder.stats();
    println!(
        "{} frames written to {} ({} samples, {} boundaries, {} suppressed)",
        written,
        out.display(),
        stats.samples,
        stats.frame_boundaries,
        stats.frames_suppressed
    );
    Ok(())
}

fn watch(file: &Path, queue: usize, settings: &Settings) -> Result<()> {
    let source = CaptureSource::new(open_capture(file)?);
    let (sink, frames) = ChannelSink::new(queue);
    let session = Session::start(
        source,
        sink,
        settings.decoder.clone(),
        settings.acquisition.clone(),
    )?;

    // The channel closes when the worker exits and drops its sink.
    for (index, frame) in frames.iter().enumerate() {
        let [r, g, b] = frame.mean_rgb();
        println!(
            "frame {:>5}  t={:>10}  {}x{}  mean rgb {:>6.1} {:>6.1} {:>6.1}",
            index, frame.timestamp, frame.width, frame.height, r, g, b
        );
    }

    let report = session.wait()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn synth(
    output: &Path,
    frames: usize,
    fill: FillKind,
    color: &[u8],
    drift: Option<i16>,
    noise: Option<i16>,
    seed: Option<u64>,
    settings: &Settings,
) -> Result<()> {
    let [r, g, b] = match color {
        [r, g, b] => [*r, *g, *b],
        _ => bail!("--color takes exactly three values"),
    };
    let mut pattern = settings.pattern.clone();
    pattern.fill = match fill {
        FillKind::Bars => Fill::default(),
        FillKind::Ramp => Fill::Ramp([r, g, b]),
        FillKind::Solid => Fill::Solid([r, g, b]),
    };
    pattern.drift_per_line = drift.unwrap_or(pattern.drift_per_line);
    pattern.color_noise = noise.unwrap_or(pattern.color_noise);
    pattern.seed = seed.unwrap_or(pattern.seed);

    let waveform = pattern
        .waveform(frames)
        .context("test pattern does not fit the decoder settings")?;
    let mut writer = CaptureWriter::new(create_capture(output)?);
    for sample in waveform {
        writer
            .write_sample(sample)
            .with_context(|| format!("failed to write {}", output.display()))?;
    }
    let written = writer.written();
    writer
        .finish()
        .with_context(|| format!("failed to flush {}", output.display()))?;
    info!(samples = written, frames, "synthetic capture written");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { file } => {
            let reader = open_capture(&file)?;
            info::info(&file, reader, &settings)?;
        }
        Commands::Decode { file, out, limit } => {
            decode(&file, &out, limit, &settings)?;
        }
        Commands::Watch { file, queue } => {
            watch(&file, queue, &settings)?;
        }
        Commands::Synth {
            output,
            frames,
            fill,
            color,
            drift,
            noise,
            seed,
        } => {
            synth(&output, frames, fill, &color, drift, noise, seed, &settings)?;
        }
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}
