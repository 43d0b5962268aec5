use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use swingpath::{AnalysisConfig, PhaseRanges, RotationParams, Severity, SwingAnalysis};

#[derive(Serialize)]
pub struct AnalysisReport<'a> {
    pub source: String,
    pub generated_at: DateTime<Utc>,
    pub tool_version: &'static str,
    pub config: &'a AnalysisConfig,
    pub analysis: &'a SwingAnalysis,
}

impl<'a> AnalysisReport<'a> {
    pub fn new(source: &Path, config: &'a AnalysisConfig, analysis: &'a SwingAnalysis) -> Self {
        Self {
            source: source.display().to_string(),
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            config,
            analysis,
        }
    }
}

pub fn write_analysis_json(report: &AnalysisReport<'_>, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn write_phases_stdout(ranges: &PhaseRanges, fps: f64) -> Result<()> {
    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut writer = csv::Writer::from_writer(handle);
    write_phase_rows(ranges, fps, &mut writer)
}

pub fn write_phases_csv(ranges: &PhaseRanges, fps: f64, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);
    write_phase_rows(ranges, fps, &mut writer)
}

pub fn write_phase_rows<W: Write>(
    ranges: &PhaseRanges,
    fps: f64,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    writer.write_record([
        "phase",
        "start_frame",
        "end_frame",
        "frames",
        "start_s",
        "end_s",
    ])?;
    for (phase, range) in ranges.iter() {
        let secs = |frame: usize| {
            if fps > 0.0 {
                format!("{:.3}", frame as f64 / fps)
            } else {
                String::new()
            }
        };
        writer.write_record([
            phase.name().to_string(),
            range.start.to_string(),
            range.end.to_string(),
            range.len().to_string(),
            secs(range.start),
            secs(range.end),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Plain-text report: phase breakdown, OTT assessment and shoulder rotation.
const SEVERE_ADVICE: &[&str] = &[
    "Your swing path shows significant out-to-in movement (over-the-top).",
    "Focus on: dropping the hands into the slot, maintaining spine angle,",
    "and starting the downswing with lower body rotation.",
];
const MODERATE_ADVICE: &[&str] = &[
    "Noticeable out-to-in tendency detected. Work on shallowing",
    "the club in transition and feeling the hands drop before turning.",
];
const OPTIMAL_ADVICE: &[&str] = &["Your swing path is in the optimal range. Maintain this!"];

/// Coaching note for a hand-path severity: heading plus body lines.
fn path_recommendation(severity: Severity) -> Option<(&'static str, &'static [&'static str])> {
    match severity {
        Severity::Severe => Some(("PRIORITY RECOMMENDATION", SEVERE_ADVICE)),
        Severity::Moderate => Some(("RECOMMENDATION", MODERATE_ADVICE)),
        Severity::Optimal => Some(("EXCELLENT", OPTIMAL_ADVICE)),
        Severity::Mild | Severity::Insufficient => None,
    }
}

fn rotation_context(params: &RotationParams) -> [String; 4] {
    [
        format!(
            "Optimal: {:.1}-{:.1} deg/frame for smooth, powerful rotation",
            params.optimal_min, params.optimal_max
        ),
        format!(
            "Too fast (>{:.1} deg/frame): often indicates OTT or early extension",
            params.optimal_max
        ),
        format!(
            "Too slow (<{:.1} deg/frame): may indicate a restricted turn",
            params.optimal_min
        ),
        format!("Tour average: ~{:.1} deg/frame", params.tour_average),
    ]
}

pub fn render_summary(analysis: &SwingAnalysis, config: &AnalysisConfig, source: &str) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "OVER-THE-TOP (OTT) ANALYSIS REPORT");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Source: {}", source);
    let _ = writeln!(
        out,
        "Frames: {} @ {:.1} fps, {}x{}, {}-handed golfer",
        analysis.frame_count, analysis.fps, analysis.width, analysis.height, analysis.golfer_side
    );

    let phases = &analysis.phases;
    let _ = writeln!(out, "\nPHASE DETECTION:");
    let _ = writeln!(out, "  Swing Start: Frame {}", phases.swing_start);
    let _ = writeln!(out, "  Swing End: Frame {}", phases.swing_end);
    let _ = writeln!(out, "\nPHASE BREAKDOWN:");
    for (phase, range) in phases.phase_ranges.iter() {
        let _ = writeln!(
            out,
            "  {:15}: Frames {:4}-{:4} ({:3} frames)",
            phase.name(),
            range.start,
            range.end,
            range.len()
        );
    }

    let dev = &analysis.deviation;
    let _ = writeln!(out, "\nHAND PATH (OTT):");
    let _ = writeln!(out, "  Severity: {}", dev.severity.description());
    match dev.diagnostics.as_ref() {
        Some(diag) => {
            let _ = writeln!(out, "  OTT Score: {:.2} / 10", dev.ott_score);
            let _ = writeln!(out, "  Confidence: {:.0}%", dev.confidence * 100.0);
            let _ = writeln!(
                out,
                "  Slopes: backswing {:+.3}, early downswing {:+.3}, late downswing {:+.3}",
                diag.backswing_slope, diag.early_slope, diag.late_slope
            );
            let _ = writeln!(
                out,
                "  Sub-scores: early {:.2}, late {:.2}, plane {:.2}",
                diag.early_score, diag.late_score, diag.plane_score
            );
            let _ = writeln!(
                out,
                "  Frames analyzed: {} (frames {}-{})",
                diag.sample_count, analysis.hand_path.start_frame, analysis.hand_path.end_frame
            );
        }
        None => {
            let _ = writeln!(out, "  Hand path too short ({} samples)", dev.sample_count);
        }
    }
    if let Some((heading, lines)) = path_recommendation(dev.severity) {
        let _ = writeln!(out, "\n{}:", heading);
        for line in lines {
            let _ = writeln!(out, "  {}", line);
        }
    }

    let rot = &analysis.rotation;
    let _ = writeln!(out, "\nSHOULDER ROTATION:");
    let _ = writeln!(out, "  Assessment: {}", rot.assessment.description());
    if !rot.details.angles.is_empty() {
        let _ = writeln!(out, "  Rotation Rate: {:.2} deg/frame", rot.rate);
        let _ = writeln!(out, "  vs Tour Average: {:+.2} deg/frame", rot.vs_tour_average);
        let _ = writeln!(
            out,
            "  Early Rotation: {}",
            if rot.early_rotation { "DETECTED" } else { "not detected" }
        );
        let _ = writeln!(out, "  Rotation Score: {:.2} / 10", rot.rotation_score);
        let _ = writeln!(
            out,
            "  Frames analyzed: {} (confidence {:.0}%)",
            rot.details.frames.len(),
            rot.confidence * 100.0
        );

        let _ = writeln!(out, "\nROTATION CONTEXT:");
        for line in rotation_context(&config.rotation) {
            let _ = writeln!(out, "  - {}", line);
        }
        if rot.early_rotation {
            let _ = writeln!(out, "\nSHOULDER RECOMMENDATION:");
            let _ = writeln!(out, "  Fast early rotation detected. This often contributes to OTT.");
            let _ = writeln!(out, "  Focus on: starting the downswing with the lower body and");
            let _ = writeln!(out, "  delaying the shoulder turn until hip rotation begins.");
        }
    }
    let _ = writeln!(out, "\nConfig hash: {}", analysis.config_hash);
    out
}

pub fn write_summary(
    analysis: &SwingAnalysis,
    config: &AnalysisConfig,
    source: &str,
    path: &Path,
) -> Result<()> {
    std::fs::write(path, render_summary(analysis, config, source))
        .with_context(|| format!("failed to write {}", path.display()))
}
