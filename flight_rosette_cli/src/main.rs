use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use flight_rosette::format::{format_duration_ms, CursorReadout};
use flight_rosette::{
    draw_rosette, resolve_pointer, FlightSummary, FrameRequest, PhaseFallback, PipelineOptions,
    Renderer, RosetteGeometry, RosetteLayout, RosettePoint, Segment, SegmentStyle, SpeedEncoder,
    TimestampSource, TrackState,
};
use plotters::coord::Shift;
use plotters::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Flight telemetry rosette CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Pipeline options JSON (keys override defaults)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Which column timestamps are taken from
    #[arg(long, global = true, value_enum)]
    timestamp_source: Option<TimestampSourceOpt>,

    /// Color blend width at speed band edges (knots)
    #[arg(long, global = true)]
    smoothing: Option<f64>,

    /// Where the averaging span ends when no landing is found
    #[arg(long, global = true, value_enum)]
    phase_fallback: Option<PhaseFallbackOpt>,

    /// Verbose logging
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Profile major stages with timings
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    profile: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize flight phase and direction for one or more telemetry CSVs
    Summary(SummaryArgs),
    /// Draw the rosette to PNG and/or SVG
    Render(RenderArgs),
    /// Resolve a canvas position to the nearest sample
    Cursor(CursorArgs),
    /// Write the closed rosette point sequence as CSV
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct SummaryArgs {
    /// Telemetry CSV files
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Emit JSON instead of CSV
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output PNG path (defaults next to the input)
    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,

    /// Output SVG path
    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    /// Square canvas edge in pixels
    #[arg(long, default_value_t = 1000)]
    size: u32,

    /// Pointer position `X,Y` to mark on the canvas
    #[arg(long)]
    cursor: Option<String>,

    /// Interpolation steps per segment
    #[arg(long, default_value_t = 12)]
    steps: usize,
}

#[derive(Parser, Debug)]
struct CursorArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Pointer position `X,Y`
    #[arg(long)]
    at: String,

    /// Square canvas edge in pixels
    #[arg(long, default_value_t = 1000)]
    size: u32,

    /// Emit JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "rosette.csv", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Square canvas edge in pixels
    #[arg(long, default_value_t = 1000)]
    size: u32,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TimestampSourceOpt {
    Epoch,
    Utc,
}

impl From<TimestampSourceOpt> for TimestampSource {
    fn from(value: TimestampSourceOpt) -> Self {
        match value {
            TimestampSourceOpt::Epoch => TimestampSource::EpochSeconds,
            TimestampSourceOpt::Utc => TimestampSource::UtcString,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PhaseFallbackOpt {
    Clamp,
    None,
}

impl From<PhaseFallbackOpt> for PhaseFallback {
    fn from(value: PhaseFallbackOpt) -> Self {
        match value {
            PhaseFallbackOpt::Clamp => PhaseFallback::ClampToDatasetBounds,
            PhaseFallbackOpt::None => PhaseFallback::None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.global.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let options = build_options(&cli.global)?;
    let timed = cli.global.profile || cli.global.verbose;

    match cli.command {
        Command::Summary(args) => handle_summary(args, &options, timed),
        Command::Render(args) => handle_render(args, &options, timed),
        Command::Cursor(args) => handle_cursor(args, &options),
        Command::Export(args) => handle_export(args, &options),
    }
}

fn build_options(global: &GlobalArgs) -> Result<PipelineOptions> {
    let mut options = match global.config.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            PipelineOptions::from_json_str(&text)
                .with_context(|| format!("failed to load options from {}", path.display()))?
        }
        None => PipelineOptions::default(),
    };
    if let Some(source) = global.timestamp_source {
        options.timestamp_source = source.into();
    }
    if let Some(width) = global.smoothing {
        options.smoothing_window_kt = width;
    }
    if let Some(fallback) = global.phase_fallback {
        options.phase_fallback = fallback.into();
    }
    options.validate()?;
    debug!("pipeline options: {:?}", options);
    Ok(options)
}

fn load_track(path: &Path, options: &PipelineOptions) -> Result<TrackState> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let state = TrackState::from_csv(&text, options);
    if state.is_empty() {
        warn!("{}: no usable samples", path.display());
    } else if !state.timestamps_monotonic() {
        warn!(
            "{}: timestamps are out of order; angles follow time, not file order",
            path.display()
        );
    }
    Ok(state)
}

fn parse_point(input: &str) -> Result<(f64, f64)> {
    let (x, y) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y but got '{}'", input))?;
    let x: f64 = x
        .trim()
        .parse()
        .with_context(|| format!("invalid x coordinate '{}'", x))?;
    let y: f64 = y
        .trim()
        .parse()
        .with_context(|| format!("invalid y coordinate '{}'", y))?;
    Ok((x, y))
}

fn canvas_layout(size: u32, options: &PipelineOptions) -> RosetteLayout {
    RosetteLayout::for_canvas(size as f64, size as f64, options)
}

#[derive(Serialize)]
struct FileSummary {
    file: String,
    #[serde(flatten)]
    summary: FlightSummary,
}

fn handle_summary(args: SummaryArgs, options: &PipelineOptions, timed: bool) -> Result<()> {
    let t_parse = Instant::now();
    let rows: Vec<FileSummary> = args
        .inputs
        .par_iter()
        .map(|path| -> Result<FileSummary> {
            let state = load_track(path, options)?;
            Ok(FileSummary {
                file: path.display().to_string(),
                summary: FlightSummary::from_track(&state),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    if timed {
        info!(
            "Parse stage: {:.1} ms ({} files)",
            t_parse.elapsed().as_secs_f64() * 1000.0,
            rows.len()
        );
    }

    let to_stdout = args.output.as_os_str() == "-";
    if args.json {
        if to_stdout {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, &rows)?;
            writeln!(handle)?;
        } else {
            let file = File::create(&args.output)
                .with_context(|| format!("failed to create {}", args.output.display()))?;
            serde_json::to_writer_pretty(file, &rows)?;
        }
    } else if to_stdout {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_summary_rows(&rows, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_summary_rows(&rows, &mut writer)?;
    }

    if !to_stdout {
        info!("Wrote summary: {}", args.output.display());
    }
    Ok(())
}

fn write_summary_rows<W: Write>(rows: &[FileSummary], writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record([
        "file",
        "callsign",
        "samples",
        "takeoff",
        "landing",
        "flight_time",
        "average_speed_kt",
        "direction",
        "timestamps_monotonic",
    ])?;
    for row in rows {
        let s = &row.summary;
        writer.write_record([
            row.file.clone(),
            s.callsign.clone().unwrap_or_default(),
            s.samples.to_string(),
            s.takeoff.clone(),
            s.landing.clone(),
            s.flight_time.clone(),
            s.average_speed_kt
                .map(|v| format!("{:.1}", v))
                .unwrap_or_default(),
            s.direction.to_string(),
            s.timestamps_monotonic.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn handle_render(args: RenderArgs, options: &PipelineOptions, timed: bool) -> Result<()> {
    let state = load_track(&args.input, options)?;
    let layout = canvas_layout(args.size, options);
    let encoder = SpeedEncoder::new(options);

    let cursor = match args.cursor.as_deref() {
        Some(text) => {
            let (x, y) = parse_point(text)?;
            let hit = resolve_pointer(&state, &layout, x, y);
            if let Some(hit) = hit {
                let readout = CursorReadout::from_sample(hit.index, &state.samples()[hit.index]);
                info!(
                    "Cursor at sample {}: {} | {} | {} | {} | {}",
                    readout.index,
                    readout.time,
                    readout.position,
                    readout.altitude,
                    readout.speed,
                    readout.heading
                );
            }
            hit.map(|h| h.index)
        }
        None => None,
    };

    let request = FrameRequest {
        layout,
        steps: args.steps.max(1),
        cursor,
    };
    let size = (args.size, args.size);

    let png_path = match (args.png.clone(), args.svg.is_some()) {
        (Some(path), _) => Some(path),
        (None, false) => Some(args.input.with_extension("png")),
        (None, true) => None,
    };

    if let Some(path) = png_path.as_ref() {
        let t_plot = Instant::now();
        match render_guard(&state, &encoder, &request, path, ChartKind::Png, size) {
            Ok(segments) => info!("Wrote rosette: {} ({} segments)", path.display(), segments),
            Err(err) => warn!("Skipping PNG render ({}): {}", path.display(), err),
        }
        if timed {
            info!(
                "Plot stage: {:.1} ms",
                t_plot.elapsed().as_secs_f64() * 1000.0
            );
        }
    }
    if let Some(path) = args.svg.as_ref() {
        match render_guard(&state, &encoder, &request, path, ChartKind::Svg, size) {
            Ok(segments) => info!("Wrote rosette: {} ({} segments)", path.display(), segments),
            Err(err) => warn!("Skipping SVG render ({}): {}", path.display(), err),
        }
    }

    let phase = state.phase();
    info!(
        "Flight time {}, direction {}",
        format_duration_ms(phase.total_flight_time_ms()),
        state.direction()
    );
    Ok(())
}

fn handle_cursor(args: CursorArgs, options: &PipelineOptions) -> Result<()> {
    let state = load_track(&args.input, options)?;
    let layout = canvas_layout(args.size, options);
    let (x, y) = parse_point(&args.at)?;
    let hit = resolve_pointer(&state, &layout, x, y)
        .ok_or_else(|| anyhow!("{} has no samples to resolve", args.input.display()))?;
    let readout = CursorReadout::from_sample(hit.index, &state.samples()[hit.index]);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut handle, &readout)?;
        writeln!(handle)?;
    } else {
        writeln!(handle, "sample:   {}", readout.index)?;
        writeln!(handle, "fraction: {:.4}", hit.fraction)?;
        writeln!(handle, "time:     {}", readout.time)?;
        writeln!(handle, "position: {}", readout.position)?;
        writeln!(handle, "altitude: {}", readout.altitude)?;
        writeln!(handle, "speed:    {}", readout.speed)?;
        writeln!(handle, "heading:  {}", readout.heading)?;
    }
    Ok(())
}

fn handle_export(args: ExportArgs, options: &PipelineOptions) -> Result<()> {
    let state = load_track(&args.input, options)?;
    let layout = canvas_layout(args.size, options);
    let encoder = SpeedEncoder::new(options);
    let geometry = RosetteGeometry::build(&state, &layout);

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_point_rows(geometry.points(), &encoder, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_point_rows(geometry.points(), &encoder, &mut writer)?;
        info!(
            "Wrote rosette points: {} ({} rows)",
            args.output.display(),
            geometry.points().len()
        );
    }
    Ok(())
}

fn fmt_opt(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        String::new()
    }
}

fn write_point_rows<W: Write>(
    points: &[RosettePoint],
    encoder: &SpeedEncoder,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "sample",
        "x",
        "y",
        "angle_rad",
        "radius",
        "altitude_ft",
        "speed_kt",
        "heading_deg",
        "timestamp_ms",
        "color",
        "stroke",
    ])?;
    for point in points {
        writer.write_record([
            point.index.to_string(),
            fmt_opt(point.x, 3),
            fmt_opt(point.y, 3),
            fmt_opt(point.angle, 6),
            fmt_opt(point.radius, 3),
            fmt_opt(point.altitude_ft, 0),
            fmt_opt(point.speed_kt, 1),
            fmt_opt(point.heading_deg, 1),
            fmt_opt(point.timestamp_ms, 0),
            encoder.color_for(point.speed_kt).to_hex(),
            format!("{:.2}", encoder.stroke_for(point.speed_kt)),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

enum ChartKind {
    Png,
    Svg,
}

fn render_guard(
    state: &TrackState,
    encoder: &SpeedEncoder,
    request: &FrameRequest,
    path: &Path,
    kind: ChartKind,
    size: (u32, u32),
) -> Result<usize, String> {
    let render = || -> Result<usize> {
        let stats = match kind {
            ChartKind::Png => {
                let area = BitMapBackend::new(path, size).into_drawing_area();
                draw_rosette(&mut PlotRenderer::new(area), state, encoder, request)?
            }
            ChartKind::Svg => {
                let area = SVGBackend::new(path, size).into_drawing_area();
                draw_rosette(&mut PlotRenderer::new(area), state, encoder, request)?
            }
        };
        Ok(stats.segments_drawn)
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
        .map_err(|err| format!("plotting error: {}", err))
}

/// Draws rosette frames onto a plotters drawing area in pixel coordinates.
struct PlotRenderer<DB: DrawingBackend> {
    area: DrawingArea<DB, Shift>,
}

impl<DB: DrawingBackend> PlotRenderer<DB> {
    fn new(area: DrawingArea<DB, Shift>) -> Self {
        Self { area }
    }
}

fn pixel(point: (f64, f64)) -> (i32, i32) {
    (point.0.round() as i32, point.1.round() as i32)
}

impl<DB> Renderer for PlotRenderer<DB>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    type Error = anyhow::Error;

    fn begin(&mut self, layout: &RosetteLayout) -> Result<()> {
        self.area.fill(&WHITE)?;
        let center = pixel((layout.center_x, layout.center_y));
        let guide = ShapeStyle {
            color: RGBColor(200, 200, 200).to_rgba(),
            filled: false,
            stroke_width: 1,
        };
        for radius in [layout.base_radius, layout.outer_radius()] {
            self.area
                .draw(&Circle::new(center, radius.round() as i32, guide))?;
        }
        Ok(())
    }

    fn draw_segment(
        &mut self,
        _segment: &Segment,
        path: &[(f64, f64)],
        style: SegmentStyle,
    ) -> Result<()> {
        let color = RGBColor(style.color.r, style.color.g, style.color.b);
        let stroke = ShapeStyle {
            color: color.to_rgba(),
            filled: false,
            stroke_width: style.stroke_weight.round().max(1.0) as u32,
        };
        let pixels: Vec<(i32, i32)> = path.iter().copied().map(pixel).collect();
        self.area.draw(&PathElement::new(pixels, stroke))?;
        Ok(())
    }

    fn draw_cursor(&mut self, point: &RosettePoint, _readout: &CursorReadout) -> Result<()> {
        let marker = ShapeStyle {
            color: BLACK.to_rgba(),
            filled: false,
            stroke_width: 2,
        };
        self.area
            .draw(&Circle::new(pixel((point.x, point.y)), 7, marker))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.area.present()?;
        Ok(())
    }
}
