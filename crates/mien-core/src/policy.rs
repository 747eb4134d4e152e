//! Match decision policy: fixed thresholds over geometric distances.

use crate::geometry;
use crate::types::{FaceObservation, LandmarkKind};
use serde::Serialize;

/// Default maximum distance between bounding-box centers, in pixels.
pub const DEFAULT_CENTER_DISTANCE_THRESHOLD: f32 = 50.0;
/// Default maximum mean landmark distance, in pixels.
pub const DEFAULT_LANDMARK_DISTANCE_THRESHOLD: f32 = 10.0;

/// Thresholds for the geometric match decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionConfig {
    /// A pair only matches when its bounding-box centers are closer than
    /// this, in pixels.
    pub center_distance_threshold: f32,
    /// A pair only matches when its mean scored-landmark distance is below
    /// this, in pixels. Ignored when no landmark is present on both sides.
    pub landmark_distance_threshold: f32,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            center_distance_threshold: DEFAULT_CENTER_DISTANCE_THRESHOLD,
            landmark_distance_threshold: DEFAULT_LANDMARK_DISTANCE_THRESHOLD,
        }
    }
}

/// What evidence the verdict rests on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionBasis {
    /// Center distance and mean landmark distance were both evaluated.
    CenterAndLandmarks,
    /// No scored landmark was present on both faces; the verdict fell back
    /// to the center-distance test alone.
    LandmarksUnavailable,
}

/// Verdict of comparing a reference observation against a live one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub is_match: bool,
    /// Normalized inverse center distance, clamped to [0, 1].
    /// 1.0 = coincident centers, 0.0 = at or beyond the threshold.
    pub confidence: f32,
    pub basis: DecisionBasis,
    /// Euclidean distance between bounding-box centers, in pixels.
    pub center_distance: f32,
    /// Mean distance over the scored landmarks, when available.
    pub mean_landmark_distance: Option<f32>,
}

/// Strategy for deciding whether two observations show the same face.
pub trait FaceMatcher {
    fn compare(&self, reference: &FaceObservation, live: &FaceObservation) -> ComparisonResult;
}

/// Threshold matcher over bounding-box center and core-landmark distances.
///
/// Deterministic and side-effect-free: identical inputs and config always
/// produce the identical verdict.
#[derive(Debug, Clone, Default)]
pub struct GeometricMatcher {
    config: DecisionConfig,
}

impl GeometricMatcher {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }
}

impl FaceMatcher for GeometricMatcher {
    fn compare(&self, reference: &FaceObservation, live: &FaceObservation) -> ComparisonResult {
        let center_distance = geometry::center_distance(reference, live);
        let mean_landmark_distance =
            geometry::mean_landmark_distance(reference, live, &LandmarkKind::CORE);

        let center_ok = center_distance < self.config.center_distance_threshold;
        let (is_match, basis) = match mean_landmark_distance {
            Some(d) => (
                center_ok && d < self.config.landmark_distance_threshold,
                DecisionBasis::CenterAndLandmarks,
            ),
            None => (center_ok, DecisionBasis::LandmarksUnavailable),
        };

        let confidence = if self.config.center_distance_threshold > 0.0 {
            (1.0 - center_distance / self.config.center_distance_threshold).clamp(0.0, 1.0)
        } else {
            0.0
        };

        tracing::debug!(
            center_distance,
            mean_landmark_distance = ?mean_landmark_distance,
            is_match,
            ?basis,
            "compared observations"
        );

        ComparisonResult {
            is_match,
            confidence,
            basis,
            center_distance,
            mean_landmark_distance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Point};
    use approx::assert_relative_eq;

    fn observation(box_: BoundingBox, landmark_shift: f32) -> FaceObservation {
        FaceObservation::new(box_)
            .with_landmark(
                LandmarkKind::LeftEye,
                Point::new(40.0 + landmark_shift, 60.0),
            )
            .with_landmark(
                LandmarkKind::RightEye,
                Point::new(80.0 + landmark_shift, 60.0),
            )
            .with_landmark(
                LandmarkKind::NoseBase,
                Point::new(60.0 + landmark_shift, 90.0),
            )
    }

    #[test]
    fn test_identical_observations_match_with_full_confidence() {
        let obs = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let result = GeometricMatcher::default().compare(&obs, &obs);

        assert!(result.is_match);
        assert_relative_eq!(result.confidence, 1.0);
        assert_relative_eq!(result.center_distance, 0.0);
        assert_relative_eq!(result.mean_landmark_distance.unwrap(), 0.0);
        assert_eq!(result.basis, DecisionBasis::CenterAndLandmarks);
    }

    #[test]
    fn test_small_shift_matches() {
        // Boxes (0,0,100,100) and (5,5,105,105): center distance ≈ 7.07 px,
        // landmarks within 2 px, both inside the default thresholds.
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = observation(BoundingBox::new(5.0, 5.0, 105.0, 105.0), 2.0);

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert!(result.is_match);
        assert_relative_eq!(result.center_distance, 50.0f32.sqrt(), epsilon = 1e-4);
        assert!(result.confidence > 0.8);
    }

    #[test]
    fn test_far_apart_does_not_match() {
        // Centers (50,50) and (500,500): distance ≈ 636.4 px.
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = observation(BoundingBox::new(450.0, 450.0, 550.0, 550.0), 0.0);

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert!(!result.is_match);
        assert_relative_eq!(result.center_distance, 636.396, epsilon = 1e-2);
        assert_relative_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_landmark_distance_vetoes_center_match() {
        // Same boxes, landmarks shifted 20 px: center check passes, the
        // landmark check (default 10 px) does not.
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 20.0);

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert!(!result.is_match);
        assert_eq!(result.basis, DecisionBasis::CenterAndLandmarks);
        assert_relative_eq!(result.mean_landmark_distance.unwrap(), 20.0, epsilon = 1e-4);
        // Confidence reflects center distance only and stays high.
        assert_relative_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_missing_landmarks_fall_back_to_center_test() {
        let reference = FaceObservation::new(BoundingBox::new(0.0, 0.0, 100.0, 100.0));
        let live = FaceObservation::new(BoundingBox::new(5.0, 5.0, 105.0, 105.0));

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert!(result.is_match);
        assert_eq!(result.basis, DecisionBasis::LandmarksUnavailable);
        assert_eq!(result.mean_landmark_distance, None);
    }

    #[test]
    fn test_one_sided_landmarks_also_fall_back() {
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = FaceObservation::new(BoundingBox::new(5.0, 5.0, 105.0, 105.0));

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert_eq!(result.basis, DecisionBasis::LandmarksUnavailable);
        assert!(result.is_match);
    }

    #[test]
    fn test_confidence_clamps_at_threshold() {
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        // Center exactly 50 px away horizontally.
        let live = observation(BoundingBox::new(50.0, 0.0, 150.0, 100.0), 0.0);

        let result = GeometricMatcher::default().compare(&reference, &live);
        assert!(!result.is_match, "distance == threshold must not match");
        assert_relative_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_custom_thresholds() {
        let matcher = GeometricMatcher::new(DecisionConfig {
            center_distance_threshold: 10.0,
            landmark_distance_threshold: 1.0,
        });
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = observation(BoundingBox::new(5.0, 5.0, 105.0, 105.0), 2.0);

        // 7.07 px center distance passes the 10 px threshold, but the 2 px
        // landmark shift fails the tightened 1 px landmark threshold.
        let result = matcher.compare(&reference, &live);
        assert!(!result.is_match);
    }

    #[test]
    fn test_compare_is_deterministic() {
        let reference = observation(BoundingBox::new(0.0, 0.0, 100.0, 100.0), 0.0);
        let live = observation(BoundingBox::new(5.0, 5.0, 105.0, 105.0), 2.0);
        let matcher = GeometricMatcher::default();

        let first = matcher.compare(&reference, &live);
        let second = matcher.compare(&reference, &live);
        assert_eq!(first, second);
    }
}
