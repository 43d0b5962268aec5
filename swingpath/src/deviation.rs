//! Over-the-top severity scoring from per-segment hand path slopes.
//!
//! The path is split at the top of the swing and again 70% of the way into the
//! downswing. Each piece gets an ordinary least-squares slope of horizontal
//! position against vertical position, which is independent of camera distance
//! and frame rate. A downswing that steepens outward relative to the backswing
//! plane scores higher.

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::path::HandPath;
use crate::signal::{argmax, mean, std_dev};
use crate::SwingError;

/// Upper bound of the combined OTT score.
pub const MAX_OTT_SCORE: f64 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    #[default]
    Right,
    Left,
}

impl Handedness {
    /// Lateral sign convention: slopes are negated for right-handed golfers.
    pub fn sign(&self) -> f64 {
        match self {
            Handedness::Right => -1.0,
            Handedness::Left => 1.0,
        }
    }
}

impl fmt::Display for Handedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handedness::Right => f.write_str("right"),
            Handedness::Left => f.write_str("left"),
        }
    }
}

impl FromStr for Handedness {
    type Err = SwingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "right" | "r" | "rh" => Ok(Handedness::Right),
            "left" | "l" | "lh" => Ok(Handedness::Left),
            other => Err(SwingError::InvalidParameter(format!(
                "golfer side must be 'right' or 'left', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub mild: f64,
    pub moderate: f64,
    pub severe: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            mild: 2.0,
            moderate: 4.0,
            severe: 7.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviationParams {
    pub min_samples: usize,
    /// Position of the early/late downswing split between top and impact.
    pub split_fraction: f64,
    /// Slope assigned to a regression segment holding a single sample.
    pub single_point_slope: f64,
    pub slope_gain: f64,
    pub early_cap: f64,
    pub late_cap: f64,
    pub plane_cap: f64,
    pub confidence_base: f64,
    pub smoothness_weight: f64,
    pub smoothness_cap: f64,
    pub consistency_weight: f64,
    pub consistency_cap: f64,
    /// Sample count at which the frame bonus saturates.
    pub full_confidence_samples: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
    pub severity: SeverityThresholds,
}

impl Default for DeviationParams {
    fn default() -> Self {
        Self {
            min_samples: 3,
            split_fraction: 0.7,
            single_point_slope: 1.0,
            slope_gain: 10.0,
            early_cap: 5.5,
            late_cap: 3.0,
            plane_cap: 1.5,
            confidence_base: 0.5,
            smoothness_weight: 0.25,
            smoothness_cap: 0.25,
            consistency_weight: 0.05,
            consistency_cap: 0.25,
            full_confidence_samples: 30.0,
            confidence_floor: 0.1,
            confidence_ceiling: 1.0,
            severity: SeverityThresholds::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Insufficient,
    Optimal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn classify(score: f64, thresholds: &SeverityThresholds) -> Self {
        if score < thresholds.mild {
            Severity::Optimal
        } else if score < thresholds.moderate {
            Severity::Mild
        } else if score < thresholds.severe {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Severity::Insufficient => "Unable to analyze - insufficient data",
            Severity::Optimal => "Optimal - on-plane downswing",
            Severity::Mild => "Mild OTT - slight outward move in transition",
            Severity::Moderate => "Moderate OTT - noticeable out-to-in path",
            Severity::Severe => "Severe OTT - significant out-to-in path",
        }
    }
}

/// Normalized samples of one regression segment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SegmentSamples {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviationDiagnostics {
    pub top_idx: usize,
    pub p6_idx: usize,
    pub impact_idx: usize,
    pub backswing_slope: f64,
    pub early_slope: f64,
    pub late_slope: f64,
    pub plane_deviation: f64,
    pub early_score: f64,
    pub late_score: f64,
    pub plane_score: f64,
    pub smoothness_penalty: f64,
    pub consistency_penalty: f64,
    pub frame_bonus: f64,
    pub backswing: SegmentSamples,
    pub early_downswing: SegmentSamples,
    pub late_downswing: SegmentSamples,
    /// Standard deviation of the normalized horizontal path.
    pub path_variance: f64,
    pub sample_count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviationScore {
    pub ott_score: f64,
    pub confidence: f64,
    pub severity: Severity,
    pub sample_count: usize,
    pub diagnostics: Option<DeviationDiagnostics>,
}

impl DeviationScore {
    fn insufficient(sample_count: usize) -> Self {
        Self {
            ott_score: 0.0,
            confidence: 0.0,
            severity: Severity::Insufficient,
            sample_count,
            diagnostics: None,
        }
    }

    pub fn is_sufficient(&self) -> bool {
        self.diagnostics.is_some()
    }
}

/// Score a hand path for over-the-top tendency.
///
/// Paths shorter than `min_samples` (never less than 3) score zero with zero
/// confidence and no diagnostics.
pub fn analyze_ott_deviation(
    hand_path: &HandPath,
    frame_width: u32,
    side: Handedness,
    params: &DeviationParams,
) -> DeviationScore {
    let n = hand_path.xs.len().min(hand_path.ys.len());
    if n < params.min_samples.max(3) {
        debug!(samples = n, "hand path too short for deviation scoring");
        return DeviationScore::insufficient(n);
    }

    let width = f64::from(frame_width.max(1));
    let x_norm: Vec<f64> = hand_path.xs[..n].iter().map(|x| x / width).collect();
    let y_peak = hand_path.ys[..n]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let y_scale = if y_peak.is_finite() && y_peak.abs() > f64::EPSILON {
        y_peak
    } else {
        1.0
    };
    let y_norm: Vec<f64> = hand_path.ys[..n].iter().map(|y| y / y_scale).collect();

    let top_idx = argmax(&y_norm[..n / 2]).unwrap_or(0);
    let impact_idx = n - 1;
    let split = (params.split_fraction * (impact_idx - top_idx) as f64).floor().max(0.0) as usize;
    let p6_idx = (top_idx + split).clamp(top_idx + 1, impact_idx - 1);

    let slope = |lo: usize, hi: usize| {
        regression_slope(&x_norm[lo..hi], &y_norm[lo..hi], params.single_point_slope)
    };
    let backswing_slope = slope(0, top_idx);
    let early_slope = slope(top_idx, p6_idx);
    let late_slope = slope(p6_idx, impact_idx);
    let plane_deviation = late_slope - backswing_slope;

    let sign = side.sign();
    let gain = params.slope_gain;
    let early_score = (sign * early_slope * gain).clamp(0.0, params.early_cap);
    let late_score = (sign * late_slope * gain).clamp(0.0, params.late_cap);
    let plane_score = (sign * plane_deviation * gain).clamp(0.0, params.plane_cap);
    let ott_score = (early_score + late_score + plane_score).clamp(0.0, MAX_OTT_SCORE);

    let path_variance = std_dev(&x_norm);
    let smoothness_penalty = ((path_variance + std_dev(&y_norm)) / 2.0 * params.smoothness_weight)
        .clamp(0.0, params.smoothness_cap);
    let consistency_penalty = ((early_slope - late_slope).abs() * params.consistency_weight)
        .clamp(0.0, params.consistency_cap);
    let frame_bonus = (n as f64 / params.full_confidence_samples).clamp(0.0, 1.0);
    let confidence = ((params.confidence_base - smoothness_penalty - consistency_penalty)
        * (1.0 + frame_bonus))
        .clamp(params.confidence_floor, params.confidence_ceiling);

    debug!(
        samples = n,
        top_idx, p6_idx, early_slope, late_slope, ott_score, confidence, "deviation scored"
    );

    let samples = |lo: usize, hi: usize| SegmentSamples {
        xs: x_norm[lo..hi].to_vec(),
        ys: y_norm[lo..hi].to_vec(),
    };

    DeviationScore {
        ott_score,
        confidence,
        severity: Severity::classify(ott_score, &params.severity),
        sample_count: n,
        diagnostics: Some(DeviationDiagnostics {
            top_idx,
            p6_idx,
            impact_idx,
            backswing_slope,
            early_slope,
            late_slope,
            plane_deviation,
            early_score,
            late_score,
            plane_score,
            smoothness_penalty,
            consistency_penalty,
            frame_bonus,
            backswing: samples(0, top_idx),
            early_downswing: samples(top_idx, p6_idx),
            late_downswing: samples(p6_idx, impact_idx),
            path_variance,
            sample_count: n,
        }),
    }
}

/// OLS slope of `xs` regressed on `ys`.
///
/// A single sample returns `single_point_slope`. An empty segment or one with
/// no vertical spread has no defined fit and returns 0.
fn regression_slope(xs: &[f64], ys: &[f64], single_point_slope: f64) -> f64 {
    match ys.len() {
        0 => return 0.0,
        1 => return single_point_slope,
        _ => {}
    }
    let (Some(mx), Some(my)) = (mean(xs), mean(ys)) else {
        return 0.0;
    };
    let xc = &ArrayView1::from(xs) - mx;
    let yc = &ArrayView1::from(ys) - my;
    let var = yc.dot(&yc);
    if var <= f64::EPSILON {
        return 0.0;
    }
    yc.dot(&xc) / var
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(xs: &[f64], ys: &[f64]) -> HandPath {
        HandPath {
            frame_idxs: (0..xs.len()).collect(),
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            start_frame: 0,
            end_frame: xs.len().saturating_sub(1),
        }
    }

    fn sample_path() -> HandPath {
        path(
            &[300.0, 310.0, 320.0, 300.0, 280.0, 260.0, 250.0, 245.0, 242.0, 240.0],
            &[100.0, 120.0, 140.0, 130.0, 110.0, 90.0, 70.0, 60.0, 50.0, 40.0],
        )
    }

    #[test]
    fn two_samples_are_insufficient() {
        let score = analyze_ott_deviation(
            &path(&[1.0, 2.0], &[3.0, 4.0]),
            640,
            Handedness::Right,
            &DeviationParams::default(),
        );
        assert_eq!(score.ott_score, 0.0);
        assert_eq!(score.confidence, 0.0);
        assert_eq!(score.severity, Severity::Insufficient);
        assert!(score.diagnostics.is_none());
        assert!(!score.is_sufficient());
    }

    #[test]
    fn splits_path_at_top_and_seventy_percent() {
        let score = analyze_ott_deviation(
            &sample_path(),
            1000,
            Handedness::Right,
            &DeviationParams::default(),
        );
        let diag = score.diagnostics.expect("diagnostics");
        assert_eq!(diag.top_idx, 2);
        assert_eq!(diag.p6_idx, 6);
        assert_eq!(diag.impact_idx, 9);
        assert_eq!(diag.backswing.xs.len(), 2);
        assert_eq!(diag.early_downswing.xs.len(), 4);
        assert_eq!(diag.late_downswing.xs.len(), 3);
        assert_eq!(diag.sample_count, 10);
    }

    #[test]
    fn sample_path_scores_match_slopes() {
        let score = analyze_ott_deviation(
            &sample_path(),
            1000,
            Handedness::Right,
            &DeviationParams::default(),
        );
        let diag = score.diagnostics.clone().unwrap();
        assert!((diag.backswing_slope - 0.07).abs() < 1e-9);
        assert!((diag.early_slope - 0.1613559322033898).abs() < 1e-9);
        assert!((diag.late_slope - 0.056).abs() < 1e-9);
        assert!((diag.plane_deviation + 0.014).abs() < 1e-9);
        // right-handed sign flips the positive slopes below zero
        assert_eq!(diag.early_score, 0.0);
        assert_eq!(diag.late_score, 0.0);
        assert!((diag.plane_score - 0.14).abs() < 1e-9);
        assert!((score.ott_score - 0.14).abs() < 1e-9);
        assert_eq!(score.severity, Severity::Optimal);
        assert!((score.confidence - 0.6154729801937134).abs() < 1e-9);

        let left = analyze_ott_deviation(
            &sample_path(),
            1000,
            Handedness::Left,
            &DeviationParams::default(),
        );
        let diag = left.diagnostics.unwrap();
        assert!((diag.early_score - 1.613559322033898).abs() < 1e-9);
        assert!((diag.late_score - 0.56).abs() < 1e-9);
        assert_eq!(diag.plane_score, 0.0);
        assert!((left.ott_score - 2.1735593220338987).abs() < 1e-9);
        assert_eq!(left.severity, Severity::Mild);
    }

    #[test]
    fn confidence_combines_penalties_and_frame_bonus() {
        let score = analyze_ott_deviation(
            &sample_path(),
            1000,
            Handedness::Right,
            &DeviationParams::default(),
        );
        let diag = score.diagnostics.unwrap();
        let expected = ((0.5 - diag.smoothness_penalty - diag.consistency_penalty)
            * (1.0 + 10.0 / 30.0))
            .clamp(0.1, 1.0);
        assert!((score.confidence - expected).abs() < 1e-12);
        assert!((diag.frame_bonus - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_sample_segment_uses_fallback_slope() {
        let score = analyze_ott_deviation(
            &path(&[10.0, 12.0, 11.0, 9.0, 8.0], &[100.0, 150.0, 120.0, 110.0, 100.0]),
            100,
            Handedness::Right,
            &DeviationParams::default(),
        );
        let diag = score.diagnostics.unwrap();
        assert_eq!(diag.top_idx, 1);
        assert_eq!(diag.backswing.xs.len(), 1);
        assert_eq!(diag.backswing_slope, 1.0);
    }

    #[test]
    fn score_and_confidence_stay_in_bounds() {
        let params = DeviationParams::default();
        for k in 1..12 {
            let n = 3 + k * 4;
            let xs: Vec<f64> = (0..n)
                .map(|i| 320.0 + ((i * 37 + k * 11) % 23) as f64 * 9.0 - (i as f64) * k as f64)
                .collect();
            let ys: Vec<f64> = (0..n)
                .map(|i| 200.0 + ((i * 13 + k) % 17) as f64 * 12.0)
                .collect();
            for side in [Handedness::Right, Handedness::Left] {
                let score = analyze_ott_deviation(&path(&xs, &ys), 640, side, &params);
                assert!((0.0..=10.0).contains(&score.ott_score), "{}", score.ott_score);
                assert!((0.1..=1.0).contains(&score.confidence), "{}", score.confidence);
            }
        }
    }

    #[test]
    fn mirrored_path_with_flipped_side_scores_the_same() {
        let width = 640u32;
        let xs = [300.0, 305.0, 312.0, 330.0, 350.0, 362.0, 371.0, 380.0, 384.0, 390.0, 393.0];
        let ys = [420.0, 380.0, 340.0, 360.0, 390.0, 420.0, 450.0, 470.0, 480.0, 490.0, 495.0];
        let mirrored: Vec<f64> = xs.iter().map(|x| f64::from(width) - x).collect();
        let params = DeviationParams::default();

        let right = analyze_ott_deviation(&path(&xs, &ys), width, Handedness::Right, &params);
        let left = analyze_ott_deviation(&path(&mirrored, &ys), width, Handedness::Left, &params);
        assert!((right.ott_score - left.ott_score).abs() < 1e-9);
        assert!((right.confidence - left.confidence).abs() < 1e-9);

        let right_m = analyze_ott_deviation(&path(&mirrored, &ys), width, Handedness::Right, &params);
        let left_o = analyze_ott_deviation(&path(&xs, &ys), width, Handedness::Left, &params);
        assert!((right_m.ott_score - left_o.ott_score).abs() < 1e-9);
    }

    #[test]
    fn empty_backswing_has_zero_slope() {
        let xs = [300.0, 305.0, 312.0, 330.0, 350.0, 362.0, 371.0, 380.0, 384.0, 390.0, 393.0];
        let ys = [420.0, 380.0, 340.0, 360.0, 390.0, 420.0, 450.0, 470.0, 480.0, 490.0, 495.0];
        let score =
            analyze_ott_deviation(&path(&xs, &ys), 640, Handedness::Right, &DeviationParams::default());
        let diag = score.diagnostics.unwrap();
        assert_eq!(diag.top_idx, 0);
        assert!(diag.backswing.xs.is_empty());
        assert_eq!(diag.backswing_slope, 0.0);
        assert!((diag.plane_deviation - diag.late_slope).abs() < 1e-12);
    }

    #[test]
    fn handedness_parses_and_displays() {
        assert_eq!("Right".parse::<Handedness>().unwrap(), Handedness::Right);
        assert_eq!(" left ".parse::<Handedness>().unwrap(), Handedness::Left);
        assert!("ambidextrous".parse::<Handedness>().is_err());
        assert_eq!(Handedness::Left.to_string(), "left");
        assert_eq!(
            serde_json::to_string(&Handedness::Right).unwrap(),
            "\"right\""
        );
    }

    #[test]
    fn flat_segment_has_zero_slope() {
        assert_eq!(regression_slope(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0], 1.0), 0.0);
        assert_eq!(regression_slope(&[4.0], &[2.0], 1.0), 1.0);
        assert_eq!(regression_slope(&[], &[], 1.0), 0.0);
        assert!((regression_slope(&[0.0, 2.0, 4.0], &[0.0, 1.0, 2.0], 1.0) - 2.0).abs() < 1e-12);
    }
}
