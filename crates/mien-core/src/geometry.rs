//! Geometric similarity scoring between two face observations.
//!
//! All distance functions are total over well-typed geometry: degenerate
//! bounding boxes still yield a numeric result, and a landmark missing on
//! either side makes that distance unavailable rather than guessed.

use crate::types::{FaceObservation, LandmarkKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("embedding length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("zero-norm vector: cosine similarity is undefined")]
    ZeroNorm,
}

/// Euclidean distance between the two observations' bounding-box centers,
/// in pixels.
pub fn center_distance(a: &FaceObservation, b: &FaceObservation) -> f32 {
    a.bounding_box.center().distance_to(b.bounding_box.center())
}

/// Distance between the two observations' `kind` landmark, or `None` when
/// either side lacks it.
pub fn landmark_distance(
    a: &FaceObservation,
    b: &FaceObservation,
    kind: LandmarkKind,
) -> Option<f32> {
    match (a.landmark(kind), b.landmark(kind)) {
        (Some(pa), Some(pb)) => Some(pa.distance_to(pb)),
        _ => None,
    }
}

/// Mean of [`landmark_distance`] over `kinds`, skipping kinds unavailable
/// on either side. `None` only when every kind is unavailable.
pub fn mean_landmark_distance(
    a: &FaceObservation,
    b: &FaceObservation,
    kinds: &[LandmarkKind],
) -> Option<f32> {
    let mut sum = 0.0f32;
    let mut count = 0usize;

    for &kind in kinds {
        if let Some(d) = landmark_distance(a, b, kind) {
            sum += d;
            count += 1;
        }
    }

    if count == 0 {
        None
    } else {
        Some(sum / count as f32)
    }
}

/// Standard cosine similarity of two equal-length vectors, in [-1, 1].
///
/// Fails fast on contract violations: mismatched lengths and zero-norm
/// inputs are programmer errors, not geometry.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, GeometryError> {
    if a.len() != b.len() {
        return Err(GeometryError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Err(GeometryError::ZeroNorm);
    }

    Ok(dot / denom)
}
