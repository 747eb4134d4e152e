use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A named anatomical point on a detected face.
///
/// Mirrors the landmark vocabulary of the upstream detectors: the three
/// core kinds (eyes and nose base) are the ones the decision policy scores;
/// the rest are carried through for display and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    NoseBase,
    MouthLeft,
    MouthRight,
    MouthBottom,
    LeftEar,
    RightEar,
    LeftCheek,
    RightCheek,
}

impl LandmarkKind {
    /// The landmarks a frontal face must expose and the decision policy
    /// scores by default.
    pub const CORE: [LandmarkKind; 3] = [
        LandmarkKind::LeftEye,
        LandmarkKind::RightEye,
        LandmarkKind::NoseBase,
    ];

    /// Stable name, identical to the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            LandmarkKind::LeftEye => "left_eye",
            LandmarkKind::RightEye => "right_eye",
            LandmarkKind::NoseBase => "nose_base",
            LandmarkKind::MouthLeft => "mouth_left",
            LandmarkKind::MouthRight => "mouth_right",
            LandmarkKind::MouthBottom => "mouth_bottom",
            LandmarkKind::LeftEar => "left_ear",
            LandmarkKind::RightEar => "right_ear",
            LandmarkKind::LeftCheek => "left_cheek",
            LandmarkKind::RightCheek => "right_cheek",
        }
    }
}

/// A 2D point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned face rectangle in image pixel coordinates.
///
/// Uses the detector convention of explicit edges (left, top, right,
/// bottom) rather than origin + size. Degenerate boxes (zero area,
/// inverted edges) are representable; every accessor stays total on them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Center of the rectangle.
    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Optional per-face classification probabilities, each in [0, 1].
///
/// Informational only: the match decision never reads these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    pub smiling: Option<f32>,
    pub left_eye_open: Option<f32>,
    pub right_eye_open: Option<f32>,
}

/// Structured output of one face-detection pass over one image.
///
/// An observation exists only for a face the detector actually found;
/// "no face in this photo" is a [`DetectionOutcome`] variant, never an
/// observation with empty fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    /// Landmarks the detector located. A missing key means the detector
    /// did not find that landmark on this face.
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkKind, Point>,
    /// Correlates the same face across frames of a stream. Unused for
    /// single-shot comparisons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<i32>,
    #[serde(default)]
    pub attributes: FaceAttributes,
}

impl FaceObservation {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_box,
            landmarks: BTreeMap::new(),
            tracking_id: None,
            attributes: FaceAttributes::default(),
        }
    }

    /// Builder-style landmark insertion, mostly for tests and fixtures.
    pub fn with_landmark(mut self, kind: LandmarkKind, point: Point) -> Self {
        self.landmarks.insert(kind, point);
        self
    }

    pub fn landmark(&self, kind: LandmarkKind) -> Option<Point> {
        self.landmarks.get(&kind).copied()
    }

    /// Whether the detector found all three core landmarks (both eyes and
    /// the nose base). Observations failing this are not usable as a
    /// registration reference.
    pub fn has_core_landmarks(&self) -> bool {
        LandmarkKind::CORE
            .iter()
            .all(|kind| self.landmarks.contains_key(kind))
    }
}

/// Result of running face detection on one photo.
///
/// Produced once per photo per attempt and never mutated. Collaborator
/// failures are data here, not `Err`: the verification workflow folds them
/// into its terminal state instead of propagating them.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    /// The detector found at least one face; this is the primary one.
    Detected(FaceObservation),
    /// The detector ran successfully and found no face.
    NoFaceFound,
    /// The detector itself failed (backend error, timeout).
    DetectionFailed { reason: String },
}

impl DetectionOutcome {
    pub fn is_detected(&self) -> bool {
        matches!(self, DetectionOutcome::Detected(_))
    }

    pub fn observation(&self) -> Option<&FaceObservation> {
        match self {
            DetectionOutcome::Detected(obs) => Some(obs),
            _ => None,
        }
    }
}
