//! tracetile CLI
//!
//! Headless front end: inspects raw IQ captures, measures cursor
//! selections, and renders trace strips to PNG through the tile scheduler.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

use clap::{Parser, Subcommand, ValueEnum};
use image::{imageops, Rgba, RgbaImage};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

use tracetile_core::{
    extract_symbols, format_si, time_ticks, AnySource, ComplexSource, SampleRange, SampleSource,
    Samples, TimeSelection, ViewConfig, Viewport,
};
use tracetile_dsp::{DemodMode, FrequencyDemod};
use tracetile_io::{open_source, RawComplexSource, RawFormat};
use tracetile_render::{composite, RenderSurface, SchedulerConfig, TileDraw, TracePlot};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    TracetileIo(#[from] tracetile_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] tracetile_core::Error),

    #[error("Render error: {0}")]
    Render(#[from] tracetile_render::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

/// Demodulated strip selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Demod {
    /// No demodulated strip
    Off,
    /// FM discriminator
    Full,
    /// Phase difference per tile
    Cheap,
}

impl Demod {
    fn mode(self) -> Option<DemodMode> {
        match self {
            Self::Off => None,
            Self::Full => Some(DemodMode::Full),
            Self::Cheap => Some(DemodMode::Cheap),
        }
    }
}

/// Capture file arguments shared by every subcommand.
#[derive(clap::Args, Debug)]
struct CaptureArgs {
    /// Raw capture file
    input: PathBuf,

    /// Sample rate in samples per second
    #[arg(short, long, default_value = "8000000")]
    rate: f64,

    /// Sample format (inferred from the extension when omitted)
    #[arg(short, long, value_parser = parse_format)]
    format: Option<RawFormat>,

    /// Occupied bandwidth as a fraction of the sample rate
    #[arg(long, default_value = "1.0")]
    bandwidth: f64,
}

fn parse_format(s: &str) -> std::result::Result<RawFormat, String> {
    s.parse().map_err(|err: tracetile_io::Error| err.to_string())
}

/// Tiled trace renderer for raw IQ captures.
#[derive(Parser)]
#[command(name = "tracetile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a capture file
    Info {
        #[command(flatten)]
        capture: CaptureArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Measure a selection divided into symbols
    Measure {
        #[command(flatten)]
        capture: CaptureArgs,

        /// First selected sample
        #[arg(long)]
        start: u64,

        /// Selected samples
        #[arg(long)]
        length: u64,

        /// Number of symbols in the selection
        #[arg(long, default_value = "1")]
        symbols: u32,

        /// Print symbol values from the demodulated trace
        #[arg(long)]
        demod: bool,
    },

    /// Render trace strips to a PNG image
    Render {
        #[command(flatten)]
        capture: CaptureArgs,

        /// Output PNG path
        #[arg(short, long)]
        output: PathBuf,

        /// FFT size as a power of two
        #[arg(long, default_value = "9")]
        fft_power: u32,

        /// Zoom steps: positive zooms in, negative zooms out
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        zoom: i32,

        /// Horizontal scroll position in columns
        #[arg(long, default_value = "0")]
        scroll: u64,

        /// Image width in pixels
        #[arg(long, default_value = "1024")]
        width: u32,

        /// Height of each strip in pixels
        #[arg(long, default_value = "200")]
        height: u32,

        /// Worker threads (defaults to available parallelism)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Add a demodulated strip under the trace
        #[arg(long, value_enum, default_value = "off")]
        demod: Demod,

        /// Give up waiting for tiles after this many milliseconds
        #[arg(long, default_value = "30000")]
        timeout_ms: u64,
    },
}

#[derive(Serialize)]
struct CaptureInfo {
    path: String,
    format: String,
    kind: String,
    samples: u64,
    rate: f64,
    duration_s: f64,
    bytes: u64,
}

/// Forwards repaint requests to the main thread.
struct ChannelSurface(Mutex<Sender<()>>);

impl RenderSurface for ChannelSurface {
    fn invalidate(&self) {
        let tx = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // The receiver is gone only once rendering has finished.
        let _ = tx.send(());
    }
}

fn resolve_format(capture: &CaptureArgs) -> Result<RawFormat> {
    match capture.format {
        Some(format) => Ok(format),
        None => Ok(RawFormat::from_path(&capture.input)?),
    }
}

fn open_complex(capture: &CaptureArgs, format: RawFormat) -> Result<Arc<ComplexSource>> {
    let source: Arc<ComplexSource> = Arc::new(
        RawComplexSource::open(&capture.input, format, capture.rate)?
            .with_relative_bandwidth(capture.bandwidth),
    );
    Ok(source)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { capture, json } => {
            let format = resolve_format(&capture)?;
            let source = open_source(&capture.input, Some(format), capture.rate)?;
            let bytes = std::fs::metadata(&capture.input)?.len();
            let info = CaptureInfo {
                path: capture.input.display().to_string(),
                format: format.to_string(),
                kind: source.kind().to_string(),
                samples: source.count(),
                rate: source.rate(),
                duration_s: source.count() as f64 / source.rate(),
                bytes,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("File: {}", info.path);
                println!("Format: {} ({})", info.format, info.kind);
                println!(
                    "Size: {} bytes ({:.2} MB)",
                    info.bytes,
                    info.bytes as f64 / 1_000_000.0
                );
                println!("Samples: {}", info.samples);
                println!("Rate: {}Hz", format_si(info.rate));
                println!("Duration: {}s", format_si(info.duration_s));
            }
        }

        Commands::Measure {
            capture,
            start,
            length,
            symbols,
            demod,
        } => {
            if symbols == 0 {
                return Err(CliError::Usage("--symbols must be at least 1".to_string()));
            }
            let format = resolve_format(&capture)?;
            let selection = TimeSelection {
                range: SampleRange::with_length(start, length),
                rate: capture.rate,
                segments: symbols,
            };

            println!("Selection: {} samples from {}", length, start);
            println!("Period: {}s", format_si(selection.period()));
            println!("Frequency: {}Hz", format_si(selection.frequency()));
            println!("Symbol period: {}s", format_si(selection.symbol_period()));
            println!("Symbol rate: {}Bd", format_si(selection.symbol_rate()));

            let count = usize::try_from(length)
                .map_err(|_| CliError::Usage(format!("selection of {length} samples is too long")))?;
            let trace = if demod {
                let source = FrequencyDemod::new(open_complex(&capture, format)?);
                source.samples(start, count)
            } else {
                match open_source(&capture.input, Some(format), capture.rate)?.samples(start, count) {
                    Some(Samples::Real(values)) => Some(values),
                    Some(Samples::Complex(_)) => {
                        log::info!("complex capture: pass --demod for symbol values");
                        None
                    }
                    None => None,
                }
            };
            match trace {
                Some(values) => {
                    let symbols = extract_symbols(&values, symbols);
                    let formatted: Vec<String> =
                        symbols.iter().map(|v| format!("{v:.4}")).collect();
                    println!("Symbols: {}", formatted.join(", "));
                }
                None if demod => {
                    return Err(CliError::Usage(format!(
                        "selection {}..{} is outside the capture",
                        start,
                        start.saturating_add(length)
                    )));
                }
                None => {}
            }
        }

        Commands::Render {
            capture,
            output,
            fft_power,
            zoom,
            scroll,
            width,
            height,
            threads,
            demod,
            timeout_ms,
        } => {
            if width == 0 || height == 0 {
                return Err(CliError::Usage("image size must be non-zero".to_string()));
            }
            let format = resolve_format(&capture)?;
            let mut config = SchedulerConfig::default().try_with_tile_height(height)?;
            if let Some(threads) = threads {
                config = config.try_with_threads(threads)?;
            }

            let (tx, rx) = mpsc::channel();
            let surface: Arc<dyn RenderSurface> = Arc::new(ChannelSurface(Mutex::new(tx)));

            let source = open_source(&capture.input, Some(format), capture.rate)?;
            let mut plots = vec![(
                "trace",
                TracePlot::new(source.clone(), Arc::clone(&surface), &config)?,
            )];
            if let Some(mode) = demod.mode() {
                let AnySource::Complex(_) = &source else {
                    return Err(CliError::Usage(
                        "demodulation needs a complex capture".to_string(),
                    ));
                };
                let complex = open_complex(&capture, format)?;
                plots.push((
                    "demod",
                    TracePlot::demodulated(complex, mode, Arc::clone(&surface), &config)?,
                ));
            }

            let view_config = ViewConfig::from_controls(fft_power, zoom)?;
            let mut viewport = Viewport::new(view_config, width, source.count());
            viewport.set_scroll(scroll);
            let range = viewport.view_range();
            eprintln!(
                "Rendering samples {}..{} ({} per column) from {}",
                range.minimum,
                range.maximum,
                viewport.samples_per_column(),
                capture.input.display()
            );

            let timeout = Duration::from_millis(timeout_ms);
            let start = Instant::now();
            let axis_height = 16;
            let mut canvas = RgbaImage::from_pixel(
                width,
                height * plots.len() as u32 + axis_height,
                Rgba([0, 0, 0, 255]),
            );
            for (row, (name, plot)) in plots.iter().enumerate() {
                let draws = render_frame(plot, &viewport, &rx, timeout);
                let missing = draws.iter().filter(|d| !d.ready).count();
                if missing > 0 {
                    log::warn!("{name}: {missing} of {} tiles unavailable", draws.len());
                }
                let strip = composite(&draws, width, height);
                imageops::overlay(&mut canvas, &strip, 0, i64::from(height) * row as i64);
                let stats = plot.scheduler().stats();
                eprintln!(
                    "  {}: {} tiles ({} rendered, {} failed)",
                    name,
                    draws.len(),
                    stats.completed,
                    stats.failed
                );
            }
            draw_time_axis(
                &mut canvas,
                &viewport,
                capture.rate,
                height * plots.len() as u32,
            );

            save_png(&canvas, &output)?;
            println!(
                "Wrote {} ({}x{}) in {:.2}s",
                output.display(),
                canvas.width(),
                canvas.height(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    Ok(())
}

/// Paints `plot` until every tile is ready, no further tile can be
/// rendered, or `timeout` elapses. Returns the last paint pass.
fn render_frame(
    plot: &TracePlot,
    viewport: &Viewport,
    repaint: &Receiver<()>,
    timeout: Duration,
) -> Vec<TileDraw> {
    let deadline = Instant::now() + timeout;
    let mut completed = plot.scheduler().stats().completed;
    loop {
        let draws = plot.paint(viewport);
        if draws.iter().all(|d| d.ready) {
            return draws;
        }
        // Batch rendering has no reason to wait for the debounce window.
        plot.scheduler().flush_pending();
        while !plot.scheduler().is_idle() {
            let now = Instant::now();
            if now >= deadline {
                log::warn!("timed out waiting for tiles");
                return draws;
            }
            let _ = repaint.recv_timeout((deadline - now).min(Duration::from_millis(100)));
        }
        let now_completed = plot.scheduler().stats().completed;
        if now_completed == completed {
            // Nothing new landed: the remaining tiles are unavailable.
            return plot.paint(viewport);
        }
        completed = now_completed;
    }
}

fn draw_time_axis(canvas: &mut RgbaImage, viewport: &Viewport, rate: f64, top: u32) {
    const MAJOR: Rgba<u8> = Rgba([200, 200, 200, 255]);
    const MINOR: Rgba<u8> = Rgba([110, 110, 110, 255]);

    let ticks = time_ticks(viewport.view_range(), rate, viewport.width(), viewport.config());
    let mut labels = Vec::new();
    for tick in ticks {
        let Ok(x) = u32::try_from(tick.column) else {
            continue;
        };
        if x >= canvas.width() {
            continue;
        }
        let (length, color) = if tick.major { (12, MAJOR) } else { (5, MINOR) };
        for y in top..(top + length).min(canvas.height()) {
            canvas.put_pixel(x, y, color);
        }
        if tick.major {
            labels.push(format!("{}s@{}", format_si(tick.seconds), x));
        }
    }
    if !labels.is_empty() {
        eprintln!("  time axis: {}", labels.join(" "));
    }
}

fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
