//! Hand path extraction over a subset of swing phases.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::phases::{Phase, PhaseRanges};
use crate::signal::{interpolate_nans, moving_average};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathParams {
    /// Phases whose combined frame span forms the hand path.
    pub phases: Vec<Phase>,
    pub smoothing_window: usize,
}

impl Default for PathParams {
    fn default() -> Self {
        Self {
            phases: vec![Phase::Top, Phase::Downswing, Phase::Impact],
            smoothing_window: 5,
        }
    }
}

/// Smoothed `(x, y)` wrist path with the absolute frame index of every sample.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HandPath {
    pub frame_idxs: Vec<usize>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub start_frame: usize,
    pub end_frame: usize,
}

impl HandPath {
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

/// Slice raw wrist x/y over `[min start, max end]` of the selected phases,
/// fill gaps and smooth each axis independently.
pub fn extract_hand_path(
    xs: &[f64],
    ys: &[f64],
    phase_ranges: &PhaseRanges,
    phases: &[Phase],
    smoothing_window: usize,
) -> HandPath {
    let bounds = phases.iter().map(|&p| phase_ranges.get(p));
    let start_frame = bounds.clone().map(|r| r.start).min();
    let end_frame = bounds.map(|r| r.end).max();
    let (start_frame, end_frame) = match (start_frame, end_frame) {
        (Some(s), Some(e)) => (s, e),
        _ => {
            debug!("no phases selected for hand path");
            return HandPath::default();
        }
    };

    let available = xs.len().min(ys.len());
    let stop = (end_frame + 1).min(available);
    if start_frame >= stop {
        debug!(start_frame, end_frame, available, "hand path span lies past the trajectory");
        return HandPath {
            start_frame,
            end_frame: start_frame,
            ..HandPath::default()
        };
    }

    let seg_xs = interpolate_nans(&xs[start_frame..stop]);
    let seg_ys = interpolate_nans(&ys[start_frame..stop]);

    HandPath {
        frame_idxs: (start_frame..stop).collect(),
        xs: moving_average(&seg_xs, smoothing_window),
        ys: moving_average(&seg_ys, smoothing_window),
        start_frame,
        end_frame: stop - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::PhaseRange;

    fn ranges() -> PhaseRanges {
        PhaseRanges {
            address: PhaseRange::new(0, 5),
            backswing: PhaseRange::new(5, 10),
            top: PhaseRange::new(10, 14),
            downswing: PhaseRange::new(14, 18),
            impact: PhaseRange::new(18, 20),
            follow_through: PhaseRange::new(20, 25),
        }
    }

    #[test]
    fn path_spans_selected_phases_inclusive() {
        let xs: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let ys: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let params = PathParams::default();
        let path = extract_hand_path(&xs, &ys, &ranges(), &params.phases, 1);
        assert_eq!(path.start_frame, 10);
        assert_eq!(path.end_frame, 20);
        assert_eq!(path.frame_idxs, (10..=20).collect::<Vec<_>>());
        assert_eq!(path.xs, xs[10..=20].to_vec());
        assert_eq!(path.xs.len(), path.ys.len());
    }

    #[test]
    fn path_fills_missing_and_smooths() {
        let mut xs = vec![10.0; 30];
        let ys = vec![50.0; 30];
        xs[12] = f64::NAN;
        xs[13] = f64::NAN;
        let path = extract_hand_path(&xs, &ys, &ranges(), &[Phase::Top, Phase::Downswing], 5);
        assert_eq!(path.len(), 9);
        assert!(path.xs.iter().all(|&x| (x - 10.0).abs() < 1e-12));
        assert!(path.ys.iter().all(|&y| (y - 50.0).abs() < 1e-12));
    }

    #[test]
    fn path_is_clamped_to_trajectory() {
        let xs = vec![1.0; 19];
        let ys = vec![2.0; 19];
        let path = extract_hand_path(&xs, &ys, &ranges(), &PathParams::default().phases, 5);
        assert_eq!(path.end_frame, 18);
        assert_eq!(path.len(), 9);
    }

    #[test]
    fn empty_selection_yields_empty_path() {
        let xs = vec![1.0; 30];
        let path = extract_hand_path(&xs, &xs, &ranges(), &[], 5);
        assert!(path.is_empty());
    }
}
