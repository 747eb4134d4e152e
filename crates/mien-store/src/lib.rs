//! mien-store — SQLite registry of registered users.
//!
//! Each record pairs a username with the PNG reference photo and the face
//! observation captured at registration time, so verification can replay
//! the stored observation against a fresh live capture.

pub mod registry;

pub use registry::{RegisteredUser, Registry, StoreError, UserSummary};
