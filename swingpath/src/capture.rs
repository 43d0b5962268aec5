//! Pose capture loading and landmark trajectory extraction.
//!
//! A capture is the per-frame output of an external pose estimator. Only the
//! wrists and shoulders are kept; other landmark names are skipped. Frames are
//! stored densely so that a frame's position always equals its index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::phases::PhaseRanges;
use crate::rotation::ShoulderPair;
use crate::SwingError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Landmark {
    LeftShoulder,
    RightShoulder,
    LeftWrist,
    RightWrist,
}

impl Landmark {
    pub const ALL: [Landmark; 4] = [
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftWrist,
        Landmark::RightWrist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Landmark::LeftShoulder => "left_shoulder",
            Landmark::RightShoulder => "right_shoulder",
            Landmark::LeftWrist => "left_wrist",
            Landmark::RightWrist => "right_wrist",
        }
    }

    /// Case and separator insensitive lookup; `LEFT_WRIST`, `left-wrist` and
    /// `LeftWrist` all match.
    pub fn from_name(name: &str) -> Option<Self> {
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Landmark::ALL
            .into_iter()
            .find(|lm| lm.name().replace('_', "") == key)
    }
}

fn full_visibility() -> f64 {
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSample {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "full_visibility")]
    pub visibility: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub index: usize,
    #[serde(default)]
    pub landmarks: BTreeMap<Landmark, LandmarkSample>,
}

impl PoseFrame {
    /// Landmark sample when present and at least `min_visibility` visible.
    pub fn visible(&self, landmark: Landmark, min_visibility: f64) -> Option<&LandmarkSample> {
        self.landmarks
            .get(&landmark)
            .filter(|s| s.visibility >= min_visibility)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coordinates {
    #[default]
    Pixel,
    /// `[0, 1]` image-relative x/y, scaled by width and height on load.
    Normalized,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoseCapture {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub coordinates: Coordinates,
    pub frames: Vec<PoseFrame>,
}

impl PoseCapture {
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Capture properties supplied by the caller. Formats without a header (CSV)
/// take them as is; JSON captures fall back to them for zero or missing fields.
#[derive(Clone, Debug)]
pub struct CaptureMeta {
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub coordinates: Coordinates,
}

impl Default for CaptureMeta {
    fn default() -> Self {
        Self {
            fps: 30.0,
            width: 0,
            height: 0,
            coordinates: Coordinates::Pixel,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkParams {
    pub wrist_visibility: f64,
    pub shoulder_visibility: f64,
}

impl Default for LandmarkParams {
    fn default() -> Self {
        Self {
            wrist_visibility: 0.4,
            shoulder_visibility: 0.5,
        }
    }
}

#[derive(Deserialize)]
struct RawCapture {
    #[serde(default)]
    fps: Option<f64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    coordinates: Option<Coordinates>,
    frames: Vec<RawFrame>,
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    landmarks: BTreeMap<String, LandmarkSample>,
}

#[derive(Deserialize)]
struct CsvRow {
    frame: usize,
    landmark: String,
    x: f64,
    y: f64,
    #[serde(default)]
    z: Option<f64>,
    #[serde(default)]
    visibility: Option<f64>,
}

type SparseFrames = BTreeMap<usize, BTreeMap<Landmark, LandmarkSample>>;

/// Largest frame index a capture may carry; frames are allocated densely up to it.
const MAX_FRAME_INDEX: usize = 1 << 20;

/// Parse a pose capture from bytes using the provided format hint (extension).
pub fn parse_capture(
    input: &[u8],
    format: &str,
    meta: &CaptureMeta,
) -> Result<PoseCapture, SwingError> {
    let format_lc = format.to_ascii_lowercase();
    if format_lc.ends_with(".json") || format_lc == "json" {
        parse_json_capture(input, meta)
    } else if format_lc.ends_with(".csv") || format_lc == "csv" {
        parse_csv_capture(input, meta)
    } else {
        Err(SwingError::UnsupportedFormat(format.to_string()))
    }
}

fn parse_json_capture(input: &[u8], meta: &CaptureMeta) -> Result<PoseCapture, SwingError> {
    let raw: RawCapture =
        serde_json::from_slice(input).map_err(|e| SwingError::CaptureParse(e.to_string()))?;
    let indexed = raw.frames.iter().filter(|f| f.index.is_some()).count();
    if indexed != 0 && indexed != raw.frames.len() {
        return Err(SwingError::CaptureParse(format!(
            "{} of {} frames carry an index; use indices on every frame or none",
            indexed,
            raw.frames.len()
        )));
    }
    let mut sparse = SparseFrames::new();
    let mut skipped = 0usize;
    for (pos, frame) in raw.frames.into_iter().enumerate() {
        let index = frame.index.unwrap_or(pos);
        if sparse.contains_key(&index) {
            debug!(index, "repeated frame index, merging landmarks");
        }
        let slot = sparse.entry(index).or_default();
        for (name, sample) in frame.landmarks {
            match Landmark::from_name(&name) {
                Some(lm) => {
                    slot.insert(lm, sample);
                }
                None => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        debug!(skipped, "ignored unknown landmarks");
    }
    let meta = CaptureMeta {
        fps: raw.fps.filter(|f| *f > 0.0).unwrap_or(meta.fps),
        width: raw.width.filter(|w| *w > 0).unwrap_or(meta.width),
        height: raw.height.filter(|h| *h > 0).unwrap_or(meta.height),
        coordinates: raw.coordinates.unwrap_or(meta.coordinates),
    };
    build_capture(sparse, &meta)
}

fn parse_csv_capture(input: &[u8], meta: &CaptureMeta) -> Result<PoseCapture, SwingError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut sparse = SparseFrames::new();
    let mut skipped = 0usize;
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| SwingError::CaptureParse(e.to_string()))?;
        let Some(lm) = Landmark::from_name(&row.landmark) else {
            skipped += 1;
            continue;
        };
        sparse.entry(row.frame).or_default().insert(
            lm,
            LandmarkSample {
                x: row.x,
                y: row.y,
                z: row.z.unwrap_or(0.0),
                visibility: row.visibility.unwrap_or(1.0),
            },
        );
    }
    if skipped > 0 {
        debug!(skipped, "ignored unknown landmark rows");
    }
    build_capture(sparse, meta)
}

fn build_capture(sparse: SparseFrames, meta: &CaptureMeta) -> Result<PoseCapture, SwingError> {
    let (sx, sy) = match meta.coordinates {
        Coordinates::Pixel => (1.0, 1.0),
        Coordinates::Normalized => {
            if meta.width == 0 || meta.height == 0 {
                return Err(SwingError::CaptureParse(
                    "normalized coordinates need a frame width and height".into(),
                ));
            }
            (f64::from(meta.width), f64::from(meta.height))
        }
    };

    let count = match sparse.keys().next_back() {
        None => 0,
        Some(&last) if last <= MAX_FRAME_INDEX => last + 1,
        Some(&last) => {
            return Err(SwingError::CaptureParse(format!(
                "frame index {} exceeds the limit of {}",
                last, MAX_FRAME_INDEX
            )))
        }
    };
    let mut frames: Vec<PoseFrame> = (0..count)
        .map(|index| PoseFrame {
            index,
            landmarks: BTreeMap::new(),
        })
        .collect();
    let filled = sparse.len();
    for (index, landmarks) in sparse {
        frames[index].landmarks = landmarks
            .into_iter()
            .map(|(lm, s)| {
                let scaled = LandmarkSample {
                    x: s.x * sx,
                    y: s.y * sy,
                    ..s
                };
                (lm, scaled)
            })
            .collect();
    }
    debug!(frames = count, gaps = count - filled, "capture loaded");

    Ok(PoseCapture {
        fps: meta.fps,
        width: meta.width,
        height: meta.height,
        coordinates: Coordinates::Pixel,
        frames,
    })
}

/// Per-frame mean of the visible wrists; NaN where neither wrist is visible.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WristTrajectory {
    pub frame_idxs: Vec<usize>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub zs: Vec<f64>,
}

pub fn wrist_trajectory(frames: &[PoseFrame], min_visibility: f64) -> WristTrajectory {
    let mut out = WristTrajectory {
        frame_idxs: Vec::with_capacity(frames.len()),
        xs: Vec::with_capacity(frames.len()),
        ys: Vec::with_capacity(frames.len()),
        zs: Vec::with_capacity(frames.len()),
    };
    for frame in frames {
        let visible: Vec<&LandmarkSample> = [Landmark::LeftWrist, Landmark::RightWrist]
            .into_iter()
            .filter_map(|lm| frame.visible(lm, min_visibility))
            .collect();
        let avg = |f: fn(&LandmarkSample) -> f64| {
            if visible.is_empty() {
                f64::NAN
            } else {
                visible.iter().map(|s| f(s)).sum::<f64>() / visible.len() as f64
            }
        };
        out.frame_idxs.push(frame.index);
        out.xs.push(avg(|s| s.x));
        out.ys.push(avg(|s| s.y));
        out.zs.push(avg(|s| s.z));
    }
    out
}

/// Shoulder pairs for frames in `Top.start ..= Impact.end` where both
/// shoulders are visible.
pub fn shoulder_positions(
    frames: &[PoseFrame],
    phase_ranges: &PhaseRanges,
    min_visibility: f64,
) -> BTreeMap<usize, ShoulderPair> {
    let first = phase_ranges.top.start;
    let last = phase_ranges.impact.end;
    frames
        .iter()
        .filter(|f| (first..=last).contains(&f.index))
        .filter_map(|f| {
            let left = f.visible(Landmark::LeftShoulder, min_visibility)?;
            let right = f.visible(Landmark::RightShoulder, min_visibility)?;
            Some((
                f.index,
                ShoulderPair {
                    left: [left.x, left.y, left.z],
                    right: [right.x, right.y, right.z],
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::PhaseRange;

    const JSON_CAPTURE: &str = r#"{
        "fps": 60,
        "width": 1280,
        "height": 720,
        "frames": [
            {"index": 0, "landmarks": {
                "left_wrist": {"x": 100.0, "y": 200.0, "z": -0.1, "visibility": 0.9},
                "right_wrist": {"x": 110.0, "y": 210.0, "z": -0.3, "visibility": 0.8},
                "nose": {"x": 1.0, "y": 2.0}
            }},
            {"index": 2, "landmarks": {
                "LEFT_WRIST": {"x": 120.0, "y": 220.0, "visibility": 0.2},
                "RIGHT_WRIST": {"x": 130.0, "y": 230.0, "visibility": 0.7}
            }}
        ]
    }"#;

    #[test]
    fn json_capture_fills_gaps_and_skips_unknown() {
        let cap = parse_capture(JSON_CAPTURE.as_bytes(), "json", &CaptureMeta::default()).unwrap();
        assert_eq!(cap.width, 1280);
        assert_eq!(cap.fps, 60.0);
        assert_eq!(cap.frame_count(), 3);
        assert_eq!(cap.frames[1].index, 1);
        assert!(cap.frames[1].landmarks.is_empty());
        assert_eq!(cap.frames[0].landmarks.len(), 2);
        assert_eq!(cap.frames[2].landmarks[&Landmark::LeftWrist].z, 0.0);
    }

    #[test]
    fn wrist_trajectory_gates_on_visibility() {
        let cap = parse_capture(JSON_CAPTURE.as_bytes(), "swing.JSON", &CaptureMeta::default())
            .unwrap();
        let traj = wrist_trajectory(&cap.frames, 0.4);
        assert_eq!(traj.frame_idxs, vec![0, 1, 2]);
        assert!((traj.xs[0] - 105.0).abs() < 1e-12);
        assert!((traj.ys[0] - 205.0).abs() < 1e-12);
        assert!((traj.zs[0] + 0.2).abs() < 1e-12);
        assert!(traj.ys[1].is_nan());
        // left wrist below threshold, right wrist alone
        assert_eq!(traj.xs[2], 130.0);
        assert_eq!(traj.ys[2], 230.0);
    }

    #[test]
    fn normalized_coordinates_are_scaled() {
        let json = r#"{"coordinates": "normalized", "frames": [
            {"landmarks": {"left_wrist": {"x": 0.5, "y": 0.25}}}
        ]}"#;
        let meta = CaptureMeta {
            width: 640,
            height: 480,
            ..CaptureMeta::default()
        };
        let cap = parse_capture(json.as_bytes(), "json", &meta).unwrap();
        let s = cap.frames[0].landmarks[&Landmark::LeftWrist];
        assert_eq!((s.x, s.y), (320.0, 120.0));
        assert_eq!(s.visibility, 1.0);
        assert_eq!(cap.coordinates, Coordinates::Pixel);

        let err = parse_capture(json.as_bytes(), "json", &CaptureMeta::default()).unwrap_err();
        assert!(matches!(err, SwingError::CaptureParse(_)));
    }

    #[test]
    fn csv_capture_groups_rows_by_frame() {
        let csv = "frame,landmark,x,y,z,visibility\n\
                   0,left_wrist,10,20,0.0,0.9\n\
                   0,right_wrist,14,24,,0.9\n\
                   0,left_ankle,1,1,0,1\n\
                   3,left_shoulder,5,6,0,0.8\n";
        let meta = CaptureMeta {
            width: 640,
            height: 480,
            ..CaptureMeta::default()
        };
        let cap = parse_capture(csv.as_bytes(), "data.csv", &meta).unwrap();
        assert_eq!(cap.frame_count(), 4);
        assert_eq!(cap.width, 640);
        assert_eq!(cap.frames[0].landmarks.len(), 2);
        assert_eq!(cap.frames[0].landmarks[&Landmark::RightWrist].z, 0.0);
        assert!(cap.frames[3].landmarks.contains_key(&Landmark::LeftShoulder));
    }

    #[test]
    fn malformed_and_unknown_inputs_fail() {
        let meta = CaptureMeta::default();
        assert!(matches!(
            parse_capture(b"{}", "mp4", &meta),
            Err(SwingError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            parse_capture(b"not json", "json", &meta),
            Err(SwingError::CaptureParse(_))
        ));
        assert!(matches!(
            parse_capture(b"frame,landmark,x,y\nzero,left_wrist,1,2\n", "csv", &meta),
            Err(SwingError::CaptureParse(_))
        ));
    }

    #[test]
    fn shoulders_restricted_to_downswing_frames() {
        let frames: Vec<PoseFrame> = (0..10)
            .map(|index| {
                let mut landmarks = BTreeMap::new();
                let vis = if index == 5 { 0.3 } else { 0.9 };
                landmarks.insert(
                    Landmark::LeftShoulder,
                    LandmarkSample { x: 100.0, y: 50.0, z: 0.0, visibility: 0.9 },
                );
                landmarks.insert(
                    Landmark::RightShoulder,
                    LandmarkSample { x: 180.0, y: 50.0 + index as f64, z: 0.0, visibility: vis },
                );
                PoseFrame { index, landmarks }
            })
            .collect();
        let ranges = PhaseRanges {
            address: PhaseRange::new(0, 2),
            backswing: PhaseRange::new(2, 3),
            top: PhaseRange::new(3, 4),
            downswing: PhaseRange::new(4, 6),
            impact: PhaseRange::new(6, 7),
            follow_through: PhaseRange::new(7, 9),
        };
        let shoulders = shoulder_positions(&frames, &ranges, 0.5);
        assert_eq!(shoulders.keys().copied().collect::<Vec<_>>(), vec![3, 4, 6, 7]);
        assert_eq!(shoulders[&4].right, [180.0, 54.0, 0.0]);
    }

    #[test]
    fn oversized_frame_indices_are_rejected() {
        let meta = CaptureMeta::default();
        for index in [u64::MAX.to_string(), "10000000000".to_string()] {
            let json = format!(
                r#"{{"frames": [{{"index": {}, "landmarks": {{"left_wrist": {{"x": 1, "y": 2}}}}}}]}}"#,
                index
            );
            assert!(matches!(
                parse_capture(json.as_bytes(), "json", &meta),
                Err(SwingError::CaptureParse(_))
            ));
        }
        let csv = format!("frame,landmark,x,y\n{},left_wrist,1,2\n", usize::MAX);
        assert!(matches!(
            parse_capture(csv.as_bytes(), "csv", &meta),
            Err(SwingError::CaptureParse(_))
        ));

        let json = format!(
            r#"{{"frames": [{{"index": {}, "landmarks": {{}}}}]}}"#,
            MAX_FRAME_INDEX
        );
        let cap = parse_capture(json.as_bytes(), "json", &meta).unwrap();
        assert_eq!(cap.frame_count(), MAX_FRAME_INDEX + 1);
    }

    #[test]
    fn mixed_indexed_and_positional_frames_are_rejected() {
        let json = r#"{"frames": [
            {"landmarks": {"left_wrist": {"x": 1, "y": 2}}},
            {"index": 0, "landmarks": {"right_wrist": {"x": 3, "y": 4}}}
        ]}"#;
        let err = parse_capture(json.as_bytes(), "json", &CaptureMeta::default()).unwrap_err();
        assert!(matches!(err, SwingError::CaptureParse(msg) if msg.contains("1 of 2")));
    }

    #[test]
    fn repeated_explicit_indices_merge_landmarks() {
        let json = r#"{"frames": [
            {"index": 1, "landmarks": {"left_wrist": {"x": 1, "y": 2}}},
            {"index": 1, "landmarks": {"right_wrist": {"x": 3, "y": 4}}}
        ]}"#;
        let cap = parse_capture(json.as_bytes(), "json", &CaptureMeta::default()).unwrap();
        assert_eq!(cap.frame_count(), 2);
        assert_eq!(cap.frames[1].landmarks.len(), 2);
    }

    #[test]
    fn landmark_names_are_flexible() {
        assert_eq!(Landmark::from_name("LEFT_WRIST"), Some(Landmark::LeftWrist));
        assert_eq!(Landmark::from_name("RightShoulder"), Some(Landmark::RightShoulder));
        assert_eq!(Landmark::from_name("right-wrist"), Some(Landmark::RightWrist));
        assert_eq!(Landmark::from_name("nose"), None);
    }
}
