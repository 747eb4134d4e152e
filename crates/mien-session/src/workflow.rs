//! The verification workflow actor.
//!
//! One task owns the [`VerificationSession`]; callers hold a cloneable
//! [`SessionHandle`] that submits commands over a channel and observes
//! state through a watch channel. Detection runs on separate tasks so a
//! slow backend never blocks command handling, and every completed
//! detection is tagged with the session epoch and a per-side submission
//! number so stale results are dropped instead of applied.

use std::sync::Arc;

use mien_core::{DetectionOutcome, FaceMatcher};
use tokio::sync::{mpsc, oneshot, watch};

use crate::detector::FaceDetector;
use crate::photo::Photo;
use crate::session::{
    CaptureSide, FailureReason, SessionError, SessionState, VerificationSession,
};

/// Messages sent from handles to the session task.
enum Command {
    StartRegistration {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SubmitPhoto {
        side: CaptureSide,
        photo: Photo,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
}

/// A completed detection, tagged for staleness checks.
struct DetectionDone {
    epoch: u64,
    submission: u64,
    side: CaptureSide,
    outcome: DetectionOutcome,
}

/// Clone-safe handle to a verification session task.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Begin a verification attempt: `Idle` → `AwaitingReferenceCapture`.
    pub async fn start_registration(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::StartRegistration { reply: reply_tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Submit the reference photo for detection.
    ///
    /// Legal only while awaiting the reference capture. Resubmitting while
    /// the previous detection is still in flight supersedes it: the last
    /// submission wins.
    pub async fn submit_reference_photo(&self, photo: Photo) -> Result<(), SessionError> {
        self.submit(CaptureSide::Reference, photo).await
    }

    /// Submit the live photo for detection. Same rules as the reference
    /// side, legal only while awaiting the live capture.
    pub async fn submit_live_photo(&self, photo: Photo) -> Result<(), SessionError> {
        self.submit(CaptureSide::Live, photo).await
    }

    async fn submit(&self, side: CaptureSide, photo: Photo) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::SubmitPhoto {
                side,
                photo,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)?
    }

    /// Discard the current attempt and return to `Idle`, from any state.
    /// Outcomes of detections still in flight are dropped when they arrive.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reset { reply: reply_tx })
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.state_rx.borrow().clone()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Wait until the session reaches `Resolved` or `Failed` and return
    /// that state. Returns immediately if it is already terminal.
    pub async fn wait_until_settled(&self) -> Result<SessionState, SessionError> {
        let mut rx = self.state_rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_terminal() {
                return Ok(current);
            }
            rx.changed().await.map_err(|_| SessionError::ChannelClosed)?;
        }
    }
}

/// Spawn a verification session task and return its handle.
///
/// The detector and matcher are injected; the task owns them for its
/// lifetime. Dropping every handle stops the task.
pub fn spawn_session(
    detector: Arc<dyn FaceDetector>,
    matcher: Box<dyn FaceMatcher + Send>,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (done_tx, done_rx) = mpsc::channel(16);
    let (state_tx, state_rx) = watch::channel(SessionState::Idle);

    let task = SessionTask {
        detector,
        matcher,
        session: VerificationSession::new(),
        state_tx,
        done_tx,
        epoch: 0,
        reference_submission: 0,
        live_submission: 0,
    };
    tokio::spawn(task.run(cmd_rx, done_rx));

    SessionHandle { cmd_tx, state_rx }
}

struct SessionTask {
    detector: Arc<dyn FaceDetector>,
    matcher: Box<dyn FaceMatcher + Send>,
    session: VerificationSession,
    state_tx: watch::Sender<SessionState>,
    done_tx: mpsc::Sender<DetectionDone>,
    /// Bumped on every reset; outcomes from an older epoch are dropped.
    epoch: u64,
    /// Per-side submission counters. Only the latest submission on each
    /// side may land; earlier ones were superseded.
    reference_submission: u64,
    live_submission: u64,
}

impl SessionTask {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut done_rx: mpsc::Receiver<DetectionDone>,
    ) {
        tracing::debug!("session task started");
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    // All handles dropped; any in-flight detection has
                    // nowhere to report.
                    None => break,
                },
                Some(done) = done_rx.recv() => self.handle_detection_done(done),
            }
        }
        tracing::debug!("session task exiting");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::StartRegistration { reply } => {
                let _ = reply.send(self.start_registration());
            }
            Command::SubmitPhoto { side, photo, reply } => {
                let _ = reply.send(self.submit_photo(side, photo));
            }
            Command::Reset { reply } => {
                self.reset();
                let _ = reply.send(());
            }
        }
    }

    fn start_registration(&mut self) -> Result<(), SessionError> {
        if !matches!(self.session.state, SessionState::Idle) {
            return Err(SessionError::InvalidState {
                operation: "start_registration",
                state: self.session.state.name(),
            });
        }
        self.transition(SessionState::AwaitingReferenceCapture);
        Ok(())
    }

    /// Validate the submission against the current state, then hand the
    /// photo to the detector on its own task. The reply goes out as soon
    /// as the submission is accepted; completion arrives through `done_tx`.
    fn submit_photo(&mut self, side: CaptureSide, photo: Photo) -> Result<(), SessionError> {
        let legal = matches!(
            (side, &self.session.state),
            (CaptureSide::Reference, SessionState::AwaitingReferenceCapture)
                | (CaptureSide::Live, SessionState::AwaitingLiveCapture)
        );
        if !legal {
            tracing::warn!(
                side = %side,
                state = self.session.state.name(),
                "rejecting out-of-order photo submission"
            );
            return Err(SessionError::InvalidState {
                operation: side.submit_operation(),
                state: self.session.state.name(),
            });
        }

        let submission = match side {
            CaptureSide::Reference => {
                self.reference_submission += 1;
                self.reference_submission
            }
            CaptureSide::Live => {
                self.live_submission += 1;
                self.live_submission
            }
        };
        let epoch = self.epoch;
        let detector = Arc::clone(&self.detector);
        let done_tx = self.done_tx.clone();

        tracing::debug!(side = %side, epoch, submission, "detection started");
        tokio::spawn(async move {
            let outcome = detector.detect(&photo).await;
            // A send failure means the session is gone; the outcome is moot.
            let _ = done_tx
                .send(DetectionDone {
                    epoch,
                    submission,
                    side,
                    outcome,
                })
                .await;
        });

        Ok(())
    }

    fn handle_detection_done(&mut self, done: DetectionDone) {
        if done.epoch != self.epoch {
            tracing::debug!(
                side = %done.side,
                epoch = done.epoch,
                current_epoch = self.epoch,
                "dropping detection outcome from before a reset"
            );
            return;
        }
        let current_submission = match done.side {
            CaptureSide::Reference => self.reference_submission,
            CaptureSide::Live => self.live_submission,
        };
        if done.submission != current_submission {
            tracing::debug!(
                side = %done.side,
                submission = done.submission,
                current_submission,
                "dropping superseded detection outcome"
            );
            return;
        }
        self.apply_outcome(done.side, done.outcome);
    }

    fn apply_outcome(&mut self, side: CaptureSide, outcome: DetectionOutcome) {
        let awaited = matches!(
            (side, &self.session.state),
            (CaptureSide::Reference, SessionState::AwaitingReferenceCapture)
                | (CaptureSide::Live, SessionState::AwaitingLiveCapture)
        );
        if !awaited {
            tracing::warn!(
                side = %side,
                state = self.session.state.name(),
                "dropping detection outcome; session has moved on"
            );
            return;
        }

        let failure = FailureReason::from_outcome(side, &outcome);
        match side {
            CaptureSide::Reference => self.session.reference = Some(outcome),
            CaptureSide::Live => self.session.live = Some(outcome),
        }

        match (side, failure) {
            (_, Some(reason)) => {
                tracing::info!(side = %side, %reason, "verification failed");
                self.transition(SessionState::Failed(reason));
            }
            (CaptureSide::Reference, None) => {
                self.transition(SessionState::AwaitingLiveCapture);
            }
            (CaptureSide::Live, None) => {
                self.transition(SessionState::Comparing);
                self.resolve();
            }
        }
    }

    /// Compare the two detected observations and resolve the session.
    /// Never produces a comparison from a partial session.
    fn resolve(&mut self) {
        let (Some(reference), Some(live)) = (
            self.session
                .reference
                .as_ref()
                .and_then(DetectionOutcome::observation),
            self.session
                .live
                .as_ref()
                .and_then(DetectionOutcome::observation),
        ) else {
            // Unreachable while transitions stay single-threaded: live
            // capture is only awaited once the reference side detected.
            tracing::error!("comparison requested without two detected faces; resetting");
            self.session.clear();
            self.transition(SessionState::Idle);
            return;
        };

        let result = self.matcher.compare(reference, live);
        tracing::info!(
            is_match = result.is_match,
            confidence = result.confidence,
            basis = ?result.basis,
            "verification resolved"
        );
        self.session.comparison = Some(result.clone());
        self.transition(SessionState::Resolved(result));
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.session.clear();
        tracing::info!(epoch = self.epoch, "session reset");
        self.transition(SessionState::Idle);
    }

    fn transition(&mut self, next: SessionState) {
        tracing::info!(
            from = self.session.state.name(),
            to = next.name(),
            "state change"
        );
        self.session.state = next.clone();
        let _ = self.state_tx.send(next);
    }
}
