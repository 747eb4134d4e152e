//! mien-session — Asynchronous face-verification workflow.
//!
//! A verification session walks idle → reference capture → live capture →
//! comparison, runs face detection through an injected collaborator, and
//! publishes every state change to subscribers. Detection results that
//! arrive after a reset or a superseding capture are dropped, never applied
//! to a session that has moved on.

pub mod detector;
pub mod photo;
pub mod session;
pub mod workflow;

pub use detector::{FaceDetector, ReplayDetector};
pub use photo::{Photo, PhotoError, PhotoSource};
pub use session::{CaptureSide, FailureReason, SessionError, SessionState};
pub use workflow::{spawn_session, SessionHandle};
