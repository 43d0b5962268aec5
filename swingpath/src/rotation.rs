//! Shoulder-line rotation rate through the downswing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::mean;

/// Left and right shoulder `[x, y, z]` in pixel space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShoulderPair {
    pub left: [f64; 3],
    pub right: [f64; 3],
}

impl ShoulderPair {
    /// Shoulder line angle in degrees, measured from the left to the right shoulder.
    pub fn angle_deg(&self) -> f64 {
        let dx = self.right[0] - self.left[0];
        let dy = self.right[1] - self.left[1];
        dy.atan2(dx).to_degrees()
    }

    fn span(&self) -> f64 {
        (self.right[0] - self.left[0]).hypot(self.right[1] - self.left[1])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationParams {
    pub min_frames: usize,
    /// Rate in deg/frame above which rotation counts as early.
    pub early_rotation_threshold: f64,
    pub score_gain: f64,
    pub max_score: f64,
    /// Frame count at which confidence saturates.
    pub full_confidence_frames: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
    pub tour_average: f64,
}

impl Default for RotationParams {
    fn default() -> Self {
        Self {
            min_frames: 3,
            early_rotation_threshold: 2.0,
            score_gain: 2.0,
            max_score: 10.0,
            full_confidence_frames: 15.0,
            optimal_min: 1.0,
            optimal_max: 2.5,
            tour_average: 1.8,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationAssessment {
    Insufficient,
    BelowOptimal,
    Optimal,
    AboveOptimal,
}

impl RotationAssessment {
    pub fn description(&self) -> &'static str {
        match self {
            RotationAssessment::Insufficient => "Unable to analyze",
            RotationAssessment::BelowOptimal => "Below optimal - rotation may be too slow",
            RotationAssessment::Optimal => "Optimal - smooth rotation rate",
            RotationAssessment::AboveOptimal => {
                "Above optimal - rotation may be too fast (OTT indicator)"
            }
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RotationDetails {
    pub frames: Vec<usize>,
    pub angles: Vec<f64>,
    /// Signed angle change between consecutive frames.
    pub rates: Vec<f64>,
    /// Mean shoulder separation as a fraction of frame width.
    pub mean_shoulder_span: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RotationMetrics {
    /// Mean absolute angle change in degrees per frame.
    pub rate: f64,
    pub early_rotation: bool,
    pub rotation_score: f64,
    pub confidence: f64,
    pub assessment: RotationAssessment,
    pub vs_tour_average: f64,
    pub details: RotationDetails,
}

impl RotationMetrics {
    fn insufficient(frames: Vec<usize>) -> Self {
        Self {
            rate: 0.0,
            early_rotation: false,
            rotation_score: 0.0,
            confidence: 0.0,
            assessment: RotationAssessment::Insufficient,
            vs_tour_average: 0.0,
            details: RotationDetails {
                frames,
                ..RotationDetails::default()
            },
        }
    }
}

pub fn analyze_shoulder_rotation(
    shoulders: &BTreeMap<usize, ShoulderPair>,
    frame_width: u32,
    params: &RotationParams,
) -> RotationMetrics {
    let frames: Vec<usize> = shoulders.keys().copied().collect();
    if frames.len() < params.min_frames.max(3) {
        debug!(frames = frames.len(), "too few shoulder frames for rotation");
        return RotationMetrics::insufficient(frames);
    }

    let angles: Vec<f64> = shoulders.values().map(ShoulderPair::angle_deg).collect();
    let rates: Vec<f64> = angles.windows(2).map(|w| w[1] - w[0]).collect();
    let abs_rates: Vec<f64> = rates.iter().map(|r| r.abs()).collect();
    let rate = mean(&abs_rates).unwrap_or(0.0);

    let assessment = if rate < params.optimal_min {
        RotationAssessment::BelowOptimal
    } else if rate > params.optimal_max {
        RotationAssessment::AboveOptimal
    } else {
        RotationAssessment::Optimal
    };

    let width = f64::from(frame_width.max(1));
    let spans: Vec<f64> = shoulders.values().map(|s| s.span() / width).collect();

    let metrics = RotationMetrics {
        rate,
        early_rotation: rate > params.early_rotation_threshold,
        rotation_score: (rate * params.score_gain).clamp(0.0, params.max_score),
        confidence: (frames.len() as f64 / params.full_confidence_frames).clamp(0.0, 1.0),
        assessment,
        vs_tour_average: rate - params.tour_average,
        details: RotationDetails {
            frames,
            angles,
            rates,
            mean_shoulder_span: mean(&spans).unwrap_or(0.0),
        },
    };
    debug!(
        rate = metrics.rate,
        score = metrics.rotation_score,
        early = metrics.early_rotation,
        "shoulder rotation scored"
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotating(frames: usize, step_deg: f64, first_frame: usize) -> BTreeMap<usize, ShoulderPair> {
        (0..frames)
            .map(|i| {
                let theta = (step_deg * i as f64).to_radians();
                let pair = ShoulderPair {
                    left: [300.0, 200.0, 0.0],
                    right: [300.0 + 80.0 * theta.cos(), 200.0 + 80.0 * theta.sin(), 0.0],
                };
                (first_frame + i, pair)
            })
            .collect()
    }

    #[test]
    fn steady_rotation_rate() {
        let m = analyze_shoulder_rotation(&rotating(20, 1.5, 40), 640, &RotationParams::default());
        assert!((m.rate - 1.5).abs() < 1e-9);
        assert!(!m.early_rotation);
        assert_eq!(m.confidence, 1.0);
        assert!((m.rotation_score - 3.0).abs() < 1e-9);
        assert_eq!(m.assessment, RotationAssessment::Optimal);
        assert!((m.vs_tour_average + 0.3).abs() < 1e-9);
        assert_eq!(m.details.frames.first(), Some(&40));
        assert_eq!(m.details.rates.len(), 19);
        assert!((m.details.mean_shoulder_span - 0.125).abs() < 1e-9);
    }

    #[test]
    fn fast_rotation_is_early_and_capped() {
        let m = analyze_shoulder_rotation(&rotating(8, 6.0, 0), 640, &RotationParams::default());
        assert!(m.early_rotation);
        assert_eq!(m.rotation_score, 10.0);
        assert_eq!(m.assessment, RotationAssessment::AboveOptimal);
        assert!((m.confidence - 8.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn slow_rotation_is_below_optimal() {
        let m = analyze_shoulder_rotation(&rotating(10, 0.5, 0), 640, &RotationParams::default());
        assert_eq!(m.assessment, RotationAssessment::BelowOptimal);
        assert!(!m.early_rotation);
    }

    #[test]
    fn too_few_frames_yield_zero() {
        let m = analyze_shoulder_rotation(&rotating(2, 5.0, 0), 640, &RotationParams::default());
        assert_eq!(m.rate, 0.0);
        assert_eq!(m.rotation_score, 0.0);
        assert_eq!(m.confidence, 0.0);
        assert!(!m.early_rotation);
        assert_eq!(m.assessment, RotationAssessment::Insufficient);
        assert_eq!(m.details.frames, vec![0, 1]);
    }

    #[test]
    fn angle_follows_image_axes() {
        let level = ShoulderPair {
            left: [0.0, 0.0, 0.0],
            right: [10.0, 0.0, 0.0],
        };
        assert_eq!(level.angle_deg(), 0.0);
        let dropped = ShoulderPair {
            left: [0.0, 0.0, 0.0],
            right: [10.0, 10.0, 0.0],
        };
        assert!((dropped.angle_deg() - 45.0).abs() < 1e-12);
    }
}
