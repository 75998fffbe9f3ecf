//! Database repositories for data access layer
//!
//! `upload` holds the record store trait and the PostgreSQL repository; `memory` holds the
//! in-memory repository used in tests and when no database is configured.

pub mod memory;
pub mod upload;

pub use memory::InMemoryUploadRepository;
pub use upload::{create_record_store, PostgresUploadRepository, UploadRecordStore};
