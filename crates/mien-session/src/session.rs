//! Session state, failure reasons and the per-attempt record.

use std::fmt;

use mien_core::{ComparisonResult, DetectionOutcome};
use thiserror::Error;

/// Which capture a photo or a detection outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSide {
    Reference,
    Live,
}

impl CaptureSide {
    pub(crate) fn submit_operation(self) -> &'static str {
        match self {
            CaptureSide::Reference => "submit_reference_photo",
            CaptureSide::Live => "submit_live_photo",
        }
    }
}

impl fmt::Display for CaptureSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSide::Reference => f.write_str("reference"),
            CaptureSide::Live => f.write_str("live"),
        }
    }
}

/// Why a verification attempt ended in [`SessionState::Failed`].
///
/// "No face" means the detector ran and found nothing (retake the photo);
/// "detection failed" means the detector itself broke (retry later). The
/// distinction drives different corrective action, so it survives into the
/// terminal state instead of collapsing into one message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FailureReason {
    #[error("no face found in the reference photo; retake it")]
    NoReferenceFace,
    #[error("no face found in the live photo; retake it")]
    NoLiveFace,
    #[error("face detection failed on the reference photo: {0}")]
    ReferenceDetectionFailed(String),
    #[error("face detection failed on the live photo: {0}")]
    LiveDetectionFailed(String),
}

impl FailureReason {
    /// Map a non-`Detected` outcome to the failure it causes on `side`.
    /// Returns `None` for `Detected`.
    pub(crate) fn from_outcome(side: CaptureSide, outcome: &DetectionOutcome) -> Option<Self> {
        match (side, outcome) {
            (_, DetectionOutcome::Detected(_)) => None,
            (CaptureSide::Reference, DetectionOutcome::NoFaceFound) => Some(Self::NoReferenceFace),
            (CaptureSide::Live, DetectionOutcome::NoFaceFound) => Some(Self::NoLiveFace),
            (CaptureSide::Reference, DetectionOutcome::DetectionFailed { reason }) => {
                Some(Self::ReferenceDetectionFailed(reason.clone()))
            }
            (CaptureSide::Live, DetectionOutcome::DetectionFailed { reason }) => {
                Some(Self::LiveDetectionFailed(reason.clone()))
            }
        }
    }
}

/// Observable state of a verification session.
///
/// Every transition is published through the session handle's watch
/// channel; `Resolved` and `Failed` are terminal until a reset.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    AwaitingReferenceCapture,
    AwaitingLiveCapture,
    Comparing,
    Resolved(ComparisonResult),
    Failed(FailureReason),
}

impl SessionState {
    /// True for `Resolved` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Resolved(_) | SessionState::Failed(_))
    }

    /// Stable name for log fields and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::AwaitingReferenceCapture => "awaiting_reference_capture",
            SessionState::AwaitingLiveCapture => "awaiting_live_capture",
            SessionState::Comparing => "comparing",
            SessionState::Resolved(_) => "resolved",
            SessionState::Failed(_) => "failed",
        }
    }
}

/// Errors returned by [`crate::SessionHandle`] operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The operation is not legal in the session's current state. The
    /// session is left untouched.
    #[error("{operation} is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("session task exited")]
    ChannelClosed,
}

/// Per-attempt record owned by the session task.
///
/// Callers never hold this; they observe [`SessionState`] snapshots and
/// submit photos through the handle.
#[derive(Debug)]
pub(crate) struct VerificationSession {
    pub state: SessionState,
    pub reference: Option<DetectionOutcome>,
    pub live: Option<DetectionOutcome>,
    pub comparison: Option<ComparisonResult>,
}

impl VerificationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            reference: None,
            live: None,
            comparison: None,
        }
    }

    /// Drop all captured outcomes and any comparison. State is handled by
    /// the caller.
    pub fn clear(&mut self) {
        self.reference = None;
        self.live = None;
        self.comparison = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_distinguishes_absence_from_breakage() {
        let absent = FailureReason::NoLiveFace.to_string();
        let broken = FailureReason::LiveDetectionFailed("backend offline".into()).to_string();
        assert!(absent.contains("no face found"));
        assert!(absent.contains("retake"));
        assert!(broken.contains("detection failed"));
        assert!(broken.contains("backend offline"));
    }

    #[test]
    fn test_from_outcome_maps_by_side() {
        assert_eq!(
            FailureReason::from_outcome(CaptureSide::Reference, &DetectionOutcome::NoFaceFound),
            Some(FailureReason::NoReferenceFace)
        );
        assert_eq!(
            FailureReason::from_outcome(CaptureSide::Live, &DetectionOutcome::NoFaceFound),
            Some(FailureReason::NoLiveFace)
        );
        let failed = DetectionOutcome::DetectionFailed {
            reason: "timeout".into(),
        };
        assert_eq!(
            FailureReason::from_outcome(CaptureSide::Live, &failed),
            Some(FailureReason::LiveDetectionFailed("timeout".into()))
        );
    }

    #[test]
    fn test_from_outcome_none_for_detected() {
        let outcome = DetectionOutcome::Detected(mien_core::FaceObservation::new(
            mien_core::BoundingBox::new(0.0, 0.0, 10.0, 10.0),
        ));
        assert_eq!(
            FailureReason::from_outcome(CaptureSide::Reference, &outcome),
            None
        );
    }

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Comparing.is_terminal());
        assert!(SessionState::Failed(FailureReason::NoLiveFace).is_terminal());
    }

    #[test]
    fn test_state_names_are_stable() {
        assert_eq!(SessionState::Idle.name(), "idle");
        assert_eq!(
            SessionState::AwaitingReferenceCapture.name(),
            "awaiting_reference_capture"
        );
        assert_eq!(
            SessionState::Failed(FailureReason::NoReferenceFace).name(),
            "failed"
        );
    }

    #[test]
    fn test_clear_drops_outcomes() {
        let mut session = VerificationSession::new();
        session.reference = Some(DetectionOutcome::NoFaceFound);
        session.comparison = None;
        session.clear();
        assert!(session.reference.is_none());
        assert!(session.live.is_none());
        assert!(session.comparison.is_none());
    }
}
