//! Face-detection collaborator seam.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use mien_core::DetectionOutcome;

use crate::photo::Photo;

/// Face detection: one photo in, one outcome out.
///
/// Implementations wrap whatever detection backend the application ships.
/// Backend errors are reported as [`DetectionOutcome::DetectionFailed`],
/// never as a panic; the workflow folds them into its failure state.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, photo: &Photo) -> DetectionOutcome;
}

/// Detector that replays pre-computed outcomes in submission order.
///
/// Backs offline verification (outcomes produced ahead of time by an
/// external detector and stored as JSON) as well as deterministic tests.
/// An exhausted queue reports a detection failure rather than inventing
/// a face.
pub struct ReplayDetector {
    outcomes: Mutex<VecDeque<DetectionOutcome>>,
}

impl ReplayDetector {
    pub fn new(outcomes: impl IntoIterator<Item = DetectionOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }

    /// Append an outcome to the back of the queue.
    pub fn push(&self, outcome: DetectionOutcome) {
        self.queue().push_back(outcome);
    }

    /// Outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<DetectionOutcome>> {
        self.outcomes.lock().expect("replay queue lock poisoned")
    }
}

#[async_trait]
impl FaceDetector for ReplayDetector {
    async fn detect(&self, _photo: &Photo) -> DetectionOutcome {
        self.queue().pop_front().unwrap_or_else(|| {
            DetectionOutcome::DetectionFailed {
                reason: "replay queue exhausted".into(),
            }
        })
    }
}
