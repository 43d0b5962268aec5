//! Analysis configuration: every tunable constant in one serde value.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::capture::LandmarkParams;
use crate::deviation::{DeviationParams, Handedness};
use crate::path::PathParams;
use crate::phases::SegmentParams;
use crate::rotation::RotationParams;
use crate::SwingError;

/// Upper bound for every smoothing or scan window, in frames.
pub const MAX_WINDOW: usize = 4096;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub golfer_side: Handedness,
    pub segment: SegmentParams,
    pub path: PathParams,
    pub deviation: DeviationParams,
    pub rotation: RotationParams,
    pub landmarks: LandmarkParams,
}

impl AnalysisConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SwingError> {
        let config: AnalysisConfig = serde_json::from_str(json)
            .map_err(|e| SwingError::InvalidParameter(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SwingError> {
        if !(0.0..=100.0).contains(&self.segment.threshold_percentile) {
            return Err(SwingError::InvalidParameter(format!(
                "threshold_percentile must lie in [0, 100], got {}",
                self.segment.threshold_percentile
            )));
        }
        if !(0.0..1.0).contains(&self.deviation.split_fraction) {
            return Err(SwingError::InvalidParameter(format!(
                "split_fraction must lie in [0, 1), got {}",
                self.deviation.split_fraction
            )));
        }
        if self.path.phases.is_empty() {
            return Err(SwingError::InvalidParameter(
                "path.phases must name at least one phase".into(),
            ));
        }

        let windows = [
            ("segment.smoothing_window", self.segment.smoothing_window),
            ("segment.precheck_window", self.segment.precheck_window),
            ("segment.address_max_window", self.segment.address_max_window),
            ("path.smoothing_window", self.path.smoothing_window),
        ];
        for (name, window) in windows {
            if window > MAX_WINDOW {
                return Err(SwingError::InvalidParameter(format!(
                    "{} must be at most {}, got {}",
                    name, MAX_WINDOW, window
                )));
            }
        }

        let dev = &self.deviation;
        let rot = &self.rotation;
        for (name, value) in [
            ("deviation.early_cap", dev.early_cap),
            ("deviation.late_cap", dev.late_cap),
            ("deviation.plane_cap", dev.plane_cap),
            ("deviation.smoothness_cap", dev.smoothness_cap),
            ("deviation.consistency_cap", dev.consistency_cap),
            ("rotation.max_score", rot.max_score),
        ] {
            non_negative(name, value)?;
        }
        for (name, value) in [
            ("deviation.full_confidence_samples", dev.full_confidence_samples),
            ("rotation.full_confidence_frames", rot.full_confidence_frames),
        ] {
            positive(name, value)?;
        }
        ordered(
            ("deviation.confidence_floor", dev.confidence_floor),
            ("deviation.confidence_ceiling", dev.confidence_ceiling),
        )?;
        ordered(
            ("rotation.optimal_min", rot.optimal_min),
            ("rotation.optimal_max", rot.optimal_max),
        )?;
        ordered(
            ("deviation.severity.mild", dev.severity.mild),
            ("deviation.severity.moderate", dev.severity.moderate),
        )?;
        ordered(
            ("deviation.severity.moderate", dev.severity.moderate),
            ("deviation.severity.severe", dev.severity.severe),
        )?;
        Ok(())
    }

    pub fn params_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    /// SHA-256 of the serialized config, stamped into every analysis.
    pub fn params_hash_sha256(&self) -> Result<String, SwingError> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| SwingError::InvalidParameter(e.to_string()))?;
        Ok(sha256_hex(&bytes))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), SwingError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(SwingError::InvalidParameter(format!(
            "{} must be finite and non-negative, got {}",
            name, value
        )))
    }
}

fn positive(name: &str, value: f64) -> Result<(), SwingError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SwingError::InvalidParameter(format!(
            "{} must be finite and positive, got {}",
            name, value
        )))
    }
}

/// `lo` must not exceed `hi`; both must be finite.
fn ordered((lo_name, lo): (&str, f64), (hi_name, hi): (&str, f64)) -> Result<(), SwingError> {
    if lo.is_finite() && hi.is_finite() && lo <= hi {
        Ok(())
    } else {
        Err(SwingError::InvalidParameter(format!(
            "{} ({}) must not exceed {} ({})",
            lo_name, lo, hi_name, hi
        )))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
