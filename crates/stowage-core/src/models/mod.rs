//! Data models for the application
//!
//! Upload sessions track one resumable upload attempt; stored files are the immutable
//! artifacts produced by a successful finalize or a direct upload.

mod file;
mod upload;

pub use file::*;
pub use upload::*;
