//! Swing phase segmentation over the vertical wrist trajectory.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signal::{
    argmax, argmin, find_flat_window, gradient, interpolate_nans, moving_average, percentile,
};
use crate::SwingError;

/// Shortest trajectory that can hold a swing window of start, turn and end.
pub const MIN_SWING_FRAMES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Address,
    Backswing,
    Top,
    Downswing,
    Impact,
    #[serde(rename = "Follow Through")]
    FollowThrough,
}

impl Phase {
    /// Canonical swing order.
    pub const ALL: [Phase; 6] = [
        Phase::Address,
        Phase::Backswing,
        Phase::Top,
        Phase::Downswing,
        Phase::Impact,
        Phase::FollowThrough,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Address => "Address",
            Phase::Backswing => "Backswing",
            Phase::Top => "Top",
            Phase::Downswing => "Downswing",
            Phase::Impact => "Impact",
            Phase::FollowThrough => "Follow Through",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = SwingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "address" => Ok(Phase::Address),
            "backswing" => Ok(Phase::Backswing),
            "top" => Ok(Phase::Top),
            "downswing" => Ok(Phase::Downswing),
            "impact" => Ok(Phase::Impact),
            "followthrough" => Ok(Phase::FollowThrough),
            _ => Err(SwingError::InvalidParameter(format!("unknown phase '{}'", s))),
        }
    }
}

/// Half-open frame interval `[start, end)`. May be empty, never inverted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRange {
    pub start: usize,
    pub end: usize,
}

impl PhaseRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Representative frame of the range (its start when empty).
    pub fn midpoint(&self) -> usize {
        self.start + self.len() / 2
    }
}

/// One range per canonical phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRanges {
    #[serde(rename = "Address")]
    pub address: PhaseRange,
    #[serde(rename = "Backswing")]
    pub backswing: PhaseRange,
    #[serde(rename = "Top")]
    pub top: PhaseRange,
    #[serde(rename = "Downswing")]
    pub downswing: PhaseRange,
    #[serde(rename = "Impact")]
    pub impact: PhaseRange,
    #[serde(rename = "Follow Through")]
    pub follow_through: PhaseRange,
}

impl PhaseRanges {
    pub fn get(&self, phase: Phase) -> PhaseRange {
        match phase {
            Phase::Address => self.address,
            Phase::Backswing => self.backswing,
            Phase::Top => self.top,
            Phase::Downswing => self.downswing,
            Phase::Impact => self.impact,
            Phase::FollowThrough => self.follow_through,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Phase, PhaseRange)> + '_ {
        Phase::ALL.iter().map(move |&phase| (phase, self.get(phase)))
    }

    /// True when every range ends at or before the next one starts.
    pub fn is_ordered(&self) -> bool {
        Phase::ALL
            .windows(2)
            .all(|pair| self.get(pair[0]).end <= self.get(pair[1]).start)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    pub smoothing_window: usize,
    /// Leading frames skipped when building the velocity baseline.
    pub precheck_window: usize,
    pub threshold_percentile: f64,
    /// Frames added on each side of the top-of-swing frame.
    pub top_margin: usize,
    /// Impact plateau tolerance as a fraction of the post-top value range.
    pub impact_tolerance: f64,
    pub address_max_window: usize,
    pub address_min_len: usize,
    pub address_max_std: f64,
    /// Lookback used for Address when no plateau qualifies.
    pub address_fallback: usize,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            precheck_window: 30,
            threshold_percentile: 90.0,
            top_margin: 5,
            impact_tolerance: 0.05,
            address_max_window: 60,
            address_min_len: 10,
            address_max_std: 1.0,
            address_fallback: 15,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwingPhases {
    pub smoothed: Vec<f64>,
    pub velocity: Vec<f64>,
    pub swing_start: usize,
    pub swing_end: usize,
    pub phase_ranges: PhaseRanges,
}

/// Segment a vertical wrist trajectory (NaN = missing) into the six swing phases.
///
/// Fails only when there are too few frames to establish a velocity baseline
/// after the precheck skip; every other short case degrades to empty ranges.
pub fn detect_swing_phases(
    wrist_y: &[f64],
    params: &SegmentParams,
) -> Result<SwingPhases, SwingError> {
    if wrist_y.len() < MIN_SWING_FRAMES {
        return Err(SwingError::InsufficientData);
    }
    let y = interpolate_nans(wrist_y);
    let smoothed = moving_average(&y, params.smoothing_window);
    let velocity: Vec<f64> = gradient(&smoothed).into_iter().map(f64::abs).collect();

    let baseline = params.precheck_window.min(velocity.len() / 3);
    let tail = &velocity[baseline..];
    let threshold =
        percentile(tail, params.threshold_percentile).ok_or(SwingError::InsufficientData)?;

    let swing_start = match tail.iter().position(|&v| v > threshold) {
        Some(rel) => baseline + rel,
        None => argmax(&velocity).unwrap_or(baseline),
    };
    let peak = swing_start + argmax(&velocity[swing_start..]).unwrap_or(0);

    let last = smoothed.len() - 1;
    let start_level = smoothed[swing_start];
    let swing_end = if peak + 1 < smoothed.len() {
        let distances: Vec<f64> = smoothed[peak + 1..]
            .iter()
            .map(|v| (v - start_level).abs())
            .collect();
        peak + 1 + argmin(&distances).unwrap_or(0)
    } else {
        last
    };

    let swing_start = swing_start.min(last);
    let swing_end = swing_end.min(last).max(swing_start + 1);
    debug!(baseline, threshold, swing_start, peak, swing_end, "swing window located");

    let seg_end = (swing_end + 1).min(smoothed.len());
    let segment = &smoothed[swing_start..seg_end];
    if segment.len() < 3 {
        debug!(
            len = segment.len(),
            "swing segment too short; collapsing phases onto swing end"
        );
        let collapsed = PhaseRange::new(swing_end, swing_end);
        let phase_ranges = PhaseRanges {
            address: PhaseRange::new(0, swing_start),
            backswing: PhaseRange::new(swing_start, swing_end),
            top: collapsed,
            downswing: collapsed,
            impact: collapsed,
            follow_through: PhaseRange::new(swing_end, last),
        };
        return Ok(SwingPhases {
            smoothed,
            velocity,
            swing_start,
            swing_end,
            phase_ranges,
        });
    }

    let top_idx = swing_start + argmin(segment).unwrap_or(0);
    let top_l = top_idx.saturating_sub(params.top_margin).max(swing_start);
    let top_r = (top_idx + params.top_margin).min(swing_end);

    let (impact_l, impact_r) = locate_impact(&smoothed, top_r, swing_end, params.impact_tolerance);

    let address = find_flat_window(
        &smoothed,
        swing_start,
        params.address_max_window,
        params.address_min_len,
        params.address_max_std,
    )
    .unwrap_or_else(|| {
        debug!(swing_start, "no address plateau found; using fixed lookback");
        (swing_start.saturating_sub(params.address_fallback), swing_start)
    });

    let phase_ranges = PhaseRanges {
        address: PhaseRange::new(address.0, address.1),
        backswing: PhaseRange::new(swing_start, top_l),
        top: PhaseRange::new(top_l, top_r),
        downswing: PhaseRange::new(top_r, top_r.max(impact_l)),
        impact: PhaseRange::new(impact_l, impact_r),
        follow_through: PhaseRange::new(impact_r, swing_end),
    };

    Ok(SwingPhases {
        smoothed,
        velocity,
        swing_start,
        swing_end,
        phase_ranges,
    })
}

/// Impact plateau in `smoothed[top_r..=swing_end]`, grown around the lowest
/// physical point while neighbours stay within the dynamic tolerance.
fn locate_impact(smoothed: &[f64], top_r: usize, swing_end: usize, tolerance: f64) -> (usize, usize) {
    let post_top = &smoothed[top_r..=swing_end];
    let candidate = match argmax(post_top) {
        Some(rel) if post_top.len() >= 3 => top_r + rel,
        _ => {
            debug!(top_r, swing_end, "post-top segment too short; impact collapses to swing end");
            return (swing_end, swing_end);
        }
    };

    let lo = post_top.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = post_top.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let tol = tolerance * (hi - lo + 1e-6);
    let level = smoothed[candidate];

    let mut left = candidate;
    while left > top_r && (smoothed[left - 1] - level).abs() <= tol {
        left -= 1;
    }
    let mut right = candidate;
    while right < swing_end && (smoothed[right + 1] - level).abs() <= tol {
        right += 1;
    }
    (left, right)
}
