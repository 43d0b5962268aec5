use std::panic;
use std::path::Path;

use anyhow::Result;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use swingpath::signal::{interpolate_nans, moving_average};
use swingpath::{PhaseRanges, SwingAnalysis};

#[derive(Clone, Copy, Debug)]
pub enum ChartKind {
    Png,
    Svg,
}

impl ChartKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ChartKind::Png => "png",
            ChartKind::Svg => "svg",
        }
    }
}

/// Window applied to the raw lateral wrist trace before plotting.
const LATERAL_SMOOTHING: usize = 5;

const PHASE_COLORS: [RGBColor; 6] = [
    RGBColor(135, 206, 250),
    RGBColor(250, 128, 114),
    RGBColor(255, 215, 0),
    RGBColor(152, 251, 152),
    RGBColor(216, 191, 216),
    RGBColor(244, 164, 96),
];

/// Run a chart renderer, turning both errors and backend panics into a message.
pub fn render_chart_guard<F>(render: F) -> Result<(), String>
where
    F: FnOnce() -> Result<()>,
{
    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
        .map_err(|e| format!("plotting error: {}", e))
}

pub fn render_phase_chart(analysis: &SwingAnalysis, path: &Path, kind: ChartKind) -> Result<()> {
    if analysis.phases.smoothed.is_empty() {
        return Ok(());
    }
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, (1280, 760)).into_drawing_area();
            draw_phase_chart(root, analysis)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (1280, 760)).into_drawing_area();
            draw_phase_chart(root, analysis)
        }
    }
}

pub fn render_hand_path_chart(
    analysis: &SwingAnalysis,
    path: &Path,
    kind: ChartKind,
) -> Result<()> {
    if analysis.hand_path.is_empty() {
        return Ok(());
    }
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, (900, 900)).into_drawing_area();
            draw_hand_path_chart(root, analysis)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (900, 900)).into_drawing_area();
            draw_hand_path_chart(root, analysis)
        }
    }
}

/// Stacked vertical and lateral wrist traces against frame number.
pub fn render_xy_chart(analysis: &SwingAnalysis, path: &Path, kind: ChartKind) -> Result<()> {
    if analysis.wrist.xs.is_empty() || analysis.phases.smoothed.is_empty() {
        return Ok(());
    }
    match kind {
        ChartKind::Png => {
            let root = BitMapBackend::new(path, (1400, 900)).into_drawing_area();
            draw_xy_chart(root, analysis)
        }
        ChartKind::Svg => {
            let root = SVGBackend::new(path, (1400, 900)).into_drawing_area();
            draw_xy_chart(root, analysis)
        }
    }
}

/// Wrist height with up as positive; without a known frame height the trace is negated.
fn flipped_heights(smoothed: &[f64], frame_height: u32) -> Vec<f64> {
    let h = f64::from(frame_height);
    smoothed.iter().map(|y| h - y).collect()
}

fn lateral_trace(xs: &[f64]) -> Vec<f64> {
    moving_average(&interpolate_nans(xs), LATERAL_SMOOTHING)
}

fn finite_bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn padded((lo, hi): (f64, f64)) -> (f64, f64) {
    let pad = ((hi - lo) * 0.05).max(1.0);
    (lo - pad, hi + pad)
}

fn draw_phase_chart<DB>(root: DrawingArea<DB, Shift>, analysis: &SwingAnalysis) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let phases = &analysis.phases;
    let x_max = phases.smoothed.len().max(2) as f64 - 1.0;
    let (y_lo, y_hi) = padded(finite_bounds(phases.smoothed.iter().copied()).unwrap_or((0.0, 1.0)));

    root.fill(&WHITE)?;
    let caption_font = FontDesc::new(FontFamily::SansSerif, 24.0, FontStyle::Normal);
    let axis_font = FontDesc::new(FontFamily::SansSerif, 18.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&root)
        .caption("Swing phases (wrist height)", caption_font)
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..x_max, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Frame")
        .y_desc("Wrist y (px, image down)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    draw_phase_bands(&mut chart, &phases.phase_ranges, (y_lo, y_hi), true)?;

    let line_color = RGBColor(50, 50, 50);
    chart
        .draw_series(LineSeries::new(
            phases
                .smoothed
                .iter()
                .enumerate()
                .map(|(i, &v)| (i as f64, v)),
            ShapeStyle {
                color: line_color.to_rgba(),
                filled: false,
                stroke_width: 2,
            },
        ))?
        .label("Smoothed wrist y")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], line_color));

    for frame in [phases.swing_start, phases.swing_end] {
        chart.draw_series(LineSeries::new(
            vec![(frame as f64, y_lo), (frame as f64, y_hi)],
            RED.stroke_width(1),
        ))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .label_font(FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal).color(&BLACK))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_hand_path_chart<DB>(root: DrawingArea<DB, Shift>, analysis: &SwingAnalysis) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let hand = &analysis.hand_path;
    let dev = &analysis.deviation;
    let (x_lo, x_hi) = padded(finite_bounds(hand.xs.iter().copied()).unwrap_or((0.0, 1.0)));
    let (y_lo, y_hi) = padded(finite_bounds(hand.ys.iter().copied()).unwrap_or((0.0, 1.0)));

    root.fill(&WHITE)?;
    let caption = format!(
        "Hand path: OTT {:.1}/10 ({})",
        dev.ott_score,
        dev.severity.description()
    );
    let mut chart = ChartBuilder::on(&root)
        .caption(
            caption,
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Normal),
        )
        .margin(25)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Wrist x (px)")
        .y_desc("Wrist y (px, image down)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;

    let path_color = RGBColor(30, 144, 255);
    chart
        .draw_series(LineSeries::new(
            hand.xs.iter().copied().zip(hand.ys.iter().copied()),
            ShapeStyle {
                color: path_color.to_rgba(),
                filled: false,
                stroke_width: 3,
            },
        ))?
        .label("Hand path")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], path_color));

    let mut markers = Vec::new();
    if let Some(diag) = dev.diagnostics.as_ref() {
        markers.push(("Top", diag.top_idx, RGBColor(34, 139, 34)));
        markers.push(("Transition split", diag.p6_idx, RGBColor(255, 140, 0)));
        markers.push(("Impact", diag.impact_idx, RGBColor(200, 0, 100)));
    }
    for (label, idx, color) in markers {
        let (Some(&x), Some(&y)) = (hand.xs.get(idx), hand.ys.get(idx)) else {
            continue;
        };
        chart
            .draw_series(std::iter::once(Circle::new((x, y), 7, color.filled())))?
            .label(label)
            .legend(move |(x, y)| Circle::new((x + 12, y), 5, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperLeft)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_phase_bands<DB>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    ranges: &PhaseRanges,
    (y_lo, y_hi): (f64, f64),
    labelled: bool,
) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    for (idx, (phase, range)) in ranges.iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        let color = PHASE_COLORS[idx % PHASE_COLORS.len()];
        let anno = chart.draw_series(std::iter::once(Rectangle::new(
            [(range.start as f64, y_lo), (range.end as f64, y_hi)],
            color.mix(0.25).filled(),
        )))?;
        if labelled {
            anno.label(phase.name()).legend(move |(x, y)| {
                Rectangle::new([(x, y - 6), (x + 24, y + 6)], color.mix(0.5).filled())
            });
        }
    }
    Ok(())
}

fn draw_xy_chart<DB>(root: DrawingArea<DB, Shift>, analysis: &SwingAnalysis) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let phases = &analysis.phases;
    let heights = flipped_heights(&phases.smoothed, analysis.height);
    let lateral = lateral_trace(&analysis.wrist.xs);
    let x_max = heights.len().max(lateral.len()).max(2) as f64 - 1.0;
    let (h_lo, h_hi) = padded(finite_bounds(heights.iter().copied()).unwrap_or((0.0, 1.0)));
    let (l_lo, l_hi) = padded(finite_bounds(lateral.iter().copied()).unwrap_or((0.0, 1.0)));

    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(450);

    let mut vertical = ChartBuilder::on(&upper)
        .caption(
            "Wrist trajectory (vertical)",
            FontDesc::new(FontFamily::SansSerif, 22.0, FontStyle::Normal),
        )
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 30)
        .build_cartesian_2d(0.0..x_max, h_lo..h_hi)?;
    vertical
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .y_desc("Vertical position (flipped)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;
    draw_phase_bands(&mut vertical, &phases.phase_ranges, (h_lo, h_hi), false)?;
    let height_color = RGBColor(46, 134, 171);
    vertical
        .draw_series(LineSeries::new(
            heights.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            height_color.stroke_width(2),
        ))?
        .label("Wrist height")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], height_color));
    vertical
        .configure_series_labels()
        .background_style(&WHITE.mix(0.7))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    let mut horizontal = ChartBuilder::on(&lower)
        .caption(
            "Lateral Movement (X) - Key for Over-the-Top Detection",
            FontDesc::new(FontFamily::SansSerif, 20.0, FontStyle::Normal),
        )
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(0.0..x_max, l_lo..l_hi)?;
    horizontal
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .x_desc("Frame")
        .y_desc("Lateral position (px)")
        .x_label_formatter(&|v| format!("{:.0}", v))
        .y_label_formatter(&|v| format!("{:.0}", v))
        .draw()?;
    draw_phase_bands(&mut horizontal, &phases.phase_ranges, (l_lo, l_hi), true)?;
    horizontal
        .draw_series(std::iter::once(Rectangle::new(
            [(phases.swing_start as f64, l_lo), (phases.swing_end as f64, l_hi)],
            BLACK.mix(0.1).filled(),
        )))?
        .label("Swing window")
        .legend(|(x, y)| Rectangle::new([(x, y - 6), (x + 24, y + 6)], BLACK.mix(0.2).filled()));
    let lateral_color = RGBColor(162, 59, 114);
    horizontal
        .draw_series(LineSeries::new(
            lateral.iter().enumerate().map(|(i, &v)| (i as f64, v)),
            lateral_color.stroke_width(2),
        ))?
        .label("Wrist lateral")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], lateral_color));
    horizontal
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(())
}
