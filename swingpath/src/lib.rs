//! Golf swing phase segmentation and over-the-top scoring from pose landmark trajectories.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub mod capture;
pub mod config;
pub mod deviation;
pub mod path;
pub mod phases;
pub mod rotation;
pub mod signal;

pub use capture::{
    parse_capture, shoulder_positions, wrist_trajectory, CaptureMeta, Coordinates, Landmark,
    LandmarkParams, LandmarkSample, PoseCapture, PoseFrame, WristTrajectory,
};
pub use config::AnalysisConfig;
pub use deviation::{
    analyze_ott_deviation, DeviationDiagnostics, DeviationParams, DeviationScore, Handedness,
    Severity,
};
pub use path::{extract_hand_path, HandPath, PathParams};
pub use phases::{
    detect_swing_phases, Phase, PhaseRange, PhaseRanges, SegmentParams, SwingPhases,
};
pub use rotation::{
    analyze_shoulder_rotation, RotationAssessment, RotationMetrics, RotationParams, ShoulderPair,
};

#[derive(Error, Debug)]
pub enum SwingError {
    #[error("insufficient data for swing segmentation")]
    InsufficientData,
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("unsupported capture format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to parse capture: {0}")]
    CaptureParse(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SwingAnalysis {
    pub config_hash: String,
    pub frame_count: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub golfer_side: Handedness,
    pub wrist: WristTrajectory,
    pub phases: SwingPhases,
    pub hand_path: HandPath,
    pub deviation: DeviationScore,
    pub rotation: RotationMetrics,
}

/// Segment a capture by its wrist height without scoring it.
pub fn segment_capture(
    capture: &PoseCapture,
    config: &AnalysisConfig,
) -> Result<(WristTrajectory, SwingPhases), SwingError> {
    let wrist = wrist_trajectory(&capture.frames, config.landmarks.wrist_visibility);
    let phases = detect_swing_phases(&wrist.ys, &config.segment)?;
    Ok((wrist, phases))
}

/// Full analysis of one capture: segmentation, hand path, OTT deviation and
/// shoulder rotation.
pub fn analyze_swing(
    capture: &PoseCapture,
    config: &AnalysisConfig,
) -> Result<SwingAnalysis, SwingError> {
    if capture.width == 0 {
        return Err(SwingError::InvalidParameter(
            "frame width must be positive".into(),
        ));
    }
    config.validate()?;
    let config_hash = config.params_hash_sha256()?;

    let (wrist, phases) = segment_capture(capture, config)?;
    debug!(
        frames = capture.frame_count(),
        swing_start = phases.swing_start,
        swing_end = phases.swing_end,
        "segmented swing"
    );

    let hand_path = extract_hand_path(
        &wrist.xs,
        &wrist.ys,
        &phases.phase_ranges,
        &config.path.phases,
        config.path.smoothing_window,
    );
    let deviation = analyze_ott_deviation(
        &hand_path,
        capture.width,
        config.golfer_side,
        &config.deviation,
    );

    let shoulders = shoulder_positions(
        &capture.frames,
        &phases.phase_ranges,
        config.landmarks.shoulder_visibility,
    );
    let rotation = analyze_shoulder_rotation(&shoulders, capture.width, &config.rotation);
    debug!(
        ott_score = deviation.ott_score,
        rotation_rate = rotation.rate,
        "scored swing"
    );

    Ok(SwingAnalysis {
        config_hash,
        frame_count: capture.frame_count(),
        fps: capture.fps,
        width: capture.width,
        height: capture.height,
        golfer_side: config.golfer_side,
        wrist,
        phases,
        hand_path,
        deviation,
        rotation,
    })
}
