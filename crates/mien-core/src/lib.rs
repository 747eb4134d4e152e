//! mien-core — Face verification decision core.
//!
//! Pure data model and arithmetic: face observations as produced by an
//! external detector, geometric distance scoring between two observations,
//! and the thresholded match/no-match decision policy.

pub mod geometry;
pub mod policy;
pub mod types;

pub use policy::{ComparisonResult, DecisionBasis, DecisionConfig, FaceMatcher, GeometricMatcher};
pub use types::{
    BoundingBox, DetectionOutcome, FaceAttributes, FaceObservation, LandmarkKind, Point,
};
