use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use rayon::prelude::*;
use swingpath::{
    analyze_swing, parse_capture, segment_capture, AnalysisConfig, CaptureMeta, Coordinates,
    Handedness, PoseCapture,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod plot;
mod report;

use plot::{
    render_chart_guard, render_hand_path_chart, render_phase_chart, render_xy_chart, ChartKind,
};
use report::AnalysisReport;

#[derive(Parser, Debug)]
#[command(author, version, about = "Golf swing phase and over-the-top analysis CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment and score one or more pose captures
    Analyze(AnalyzeArgs),
    /// Segment a single pose capture and write its phase table
    Phases(PhasesArgs),
    /// Print the default analysis configuration as JSON
    Config(ConfigArgs),
}

#[derive(Args, Debug)]
struct CaptureOpts {
    /// Frame width in pixels for captures that do not carry one (CSV)
    #[arg(long)]
    width: Option<u32>,

    /// Frame height in pixels for captures that do not carry one (CSV)
    #[arg(long)]
    height: Option<u32>,

    /// Frame rate for captures that do not carry one
    #[arg(long)]
    fps: Option<f64>,

    /// Landmark x/y are image-relative in [0, 1]
    #[arg(long, action = ArgAction::SetTrue)]
    normalized: bool,
}

impl CaptureOpts {
    fn meta(&self) -> CaptureMeta {
        let defaults = CaptureMeta::default();
        CaptureMeta {
            fps: self.fps.unwrap_or(defaults.fps),
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            coordinates: if self.normalized {
                Coordinates::Normalized
            } else {
                defaults.coordinates
            },
        }
    }
}

#[derive(Args, Debug)]
struct TuningOpts {
    /// Analysis config JSON (missing fields take defaults)
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Golfer handedness
    #[arg(long, value_enum)]
    golfer_side: Option<SideOpt>,

    /// Moving-average window for the wrist height signal
    #[arg(long)]
    smoothing_window: Option<usize>,

    /// Frames at the start excluded from the speed threshold
    #[arg(long)]
    precheck_window: Option<usize>,

    /// Percentile of wrist speed that marks swing onset
    #[arg(long)]
    threshold_percentile: Option<f64>,
}

#[derive(Parser, Debug)]
struct AnalyzeArgs {
    /// Pose capture files (JSON or CSV)
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    #[command(flatten)]
    capture: CaptureOpts,

    #[command(flatten)]
    tuning: TuningOpts,

    /// Directory for analysis JSON, phase CSV, summary and plots
    #[arg(short, long, default_value = "outputs", value_hint = ValueHint::DirPath)]
    output_dir: PathBuf,

    /// Disable plot generation
    #[arg(long, action = ArgAction::SetTrue)]
    no_plot: bool,

    /// Render plots as SVG instead of PNG
    #[arg(long, action = ArgAction::SetTrue)]
    svg: bool,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct PhasesArgs {
    /// Pose capture file (JSON or CSV)
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    #[command(flatten)]
    capture: CaptureOpts,

    #[command(flatten)]
    tuning: TuningOpts,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct ConfigArgs {
    /// Write to a file instead of stdout
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SideOpt {
    Right,
    Left,
}

impl From<SideOpt> for Handedness {
    fn from(value: SideOpt) -> Self {
        match value {
            SideOpt::Right => Handedness::Right,
            SideOpt::Left => Handedness::Left,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Analyze(args) => args.verbose,
        Command::Phases(args) => args.verbose,
        Command::Config(_) => false,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Phases(args) => handle_phases(args),
        Command::Config(args) => handle_config(args),
    }
}

fn load_config(opts: &TuningOpts) -> Result<AnalysisConfig> {
    let mut config = match opts.config.as_ref() {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            AnalysisConfig::from_json_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => AnalysisConfig::default(),
    };
    if let Some(side) = opts.golfer_side {
        config.golfer_side = side.into();
    }
    if let Some(w) = opts.smoothing_window {
        config.segment.smoothing_window = w;
    }
    if let Some(w) = opts.precheck_window {
        config.segment.precheck_window = w;
    }
    if let Some(p) = opts.threshold_percentile {
        config.segment.threshold_percentile = p;
    }
    config.validate()?;
    Ok(config)
}

fn load_capture(path: &Path, meta: &CaptureMeta) -> Result<PoseCapture> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let hint = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("json");
    parse_capture(&data, hint, meta).with_context(|| format!("failed to parse {}", path.display()))
}

fn output_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("capture")
        .to_string()
}

fn handle_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(&args.tuning)?;
    let meta = args.capture.meta();
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
    let plot_kind = if args.no_plot {
        None
    } else if args.svg {
        Some(ChartKind::Svg)
    } else {
        Some(ChartKind::Png)
    };

    let t_total = Instant::now();
    let outcomes: Vec<(PathBuf, Result<()>)> = args
        .inputs
        .par_iter()
        .map(|path| {
            let outcome = process_input(path, &config, &meta, &args.output_dir, plot_kind);
            (path.clone(), outcome)
        })
        .collect();

    let mut failed = 0usize;
    for (path, outcome) in &outcomes {
        if let Err(err) = outcome {
            warn!("Failed to analyze {}: {:#}", path.display(), err);
            failed += 1;
        }
    }
    info!(
        "Analyzed {} of {} captures in {:.1} ms",
        outcomes.len() - failed,
        outcomes.len(),
        t_total.elapsed().as_secs_f64() * 1000.0
    );
    if failed > 0 {
        return Err(anyhow!("{} of {} captures failed", failed, outcomes.len()));
    }
    Ok(())
}

fn process_input(
    path: &Path,
    config: &AnalysisConfig,
    meta: &CaptureMeta,
    output_dir: &Path,
    plot_kind: Option<ChartKind>,
) -> Result<()> {
    let t_start = Instant::now();
    let capture = load_capture(path, meta)?;
    let analysis = analyze_swing(&capture, config)
        .with_context(|| format!("failed to analyze {}", path.display()))?;
    debug!(
        "{}: analysis in {:.1} ms",
        path.display(),
        t_start.elapsed().as_secs_f64() * 1000.0
    );

    let stem = output_stem(path);
    let json_path = output_dir.join(format!("{}_analysis.json", stem));
    report::write_analysis_json(&AnalysisReport::new(path, config, &analysis), &json_path)?;
    let csv_path = output_dir.join(format!("{}_phases.csv", stem));
    report::write_phases_csv(&analysis.phases.phase_ranges, analysis.fps, &csv_path)?;
    let summary_path = output_dir.join(format!("{}_summary.txt", stem));
    report::write_summary(&analysis, config, &path.display().to_string(), &summary_path)?;

    if let Some(kind) = plot_kind {
        let phase_png = output_dir.join(format!("{}_phases.{}", stem, kind.extension()));
        if let Err(err) = render_chart_guard(|| render_phase_chart(&analysis, &phase_png, kind)) {
            warn!("Skipping phase plot ({}): {}", phase_png.display(), err);
        }
        let path_png = output_dir.join(format!("{}_hand_path.{}", stem, kind.extension()));
        if let Err(err) = render_chart_guard(|| render_hand_path_chart(&analysis, &path_png, kind))
        {
            warn!("Skipping hand path plot ({}): {}", path_png.display(), err);
        }
        let xy_png = output_dir.join(format!("{}_xy.{}", stem, kind.extension()));
        if let Err(err) = render_chart_guard(|| render_xy_chart(&analysis, &xy_png, kind)) {
            warn!("Skipping XY trajectory plot ({}): {}", xy_png.display(), err);
        }
    }

    info!(
        "{}: swing {}-{}, OTT {:.2} ({:?}), rotation {:.2} deg/frame",
        path.display(),
        analysis.phases.swing_start,
        analysis.phases.swing_end,
        analysis.deviation.ott_score,
        analysis.deviation.severity,
        analysis.rotation.rate
    );
    Ok(())
}

fn handle_phases(args: PhasesArgs) -> Result<()> {
    let config = load_config(&args.tuning)?;
    let capture = load_capture(&args.input, &args.capture.meta())?;
    let (_, phases) = segment_capture(&capture, &config)
        .with_context(|| format!("failed to segment {}", args.input.display()))?;
    info!(
        "Swing window: frames {}-{}",
        phases.swing_start, phases.swing_end
    );

    if args.output.as_os_str() == "-" {
        report::write_phases_stdout(&phases.phase_ranges, capture.fps)?;
    } else {
        report::write_phases_csv(&phases.phase_ranges, capture.fps, &args.output)?;
        info!("Wrote phase CSV: {}", args.output.display());
    }
    Ok(())
}

fn handle_config(args: ConfigArgs) -> Result<()> {
    let text = serde_json::to_string_pretty(&AnalysisConfig::default())?;
    match args.output {
        Some(path) => {
            fs::write(&path, text + "\n")
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote config: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
