//! Stowage upload services
//!
//! The resumable chunked-upload state machine ([`UploadService`]), the [`Finalizer`] that
//! promotes completed uploads, the single-request direct path and the per-session lock
//! registry that serializes work on one session.

pub mod direct;
pub mod finalizer;
pub mod locks;
pub mod upload;

pub use finalizer::Finalizer;
pub use locks::{SessionGuard, SessionLocks};
pub use upload::UploadService;

/// Log target for upload lifecycle events.
pub const UPLOAD_LOG_TARGET: &str = "stowage::upload";
