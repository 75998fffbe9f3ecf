//! Stowage record store
//!
//! Persistence for upload sessions and stored files behind the [`UploadRecordStore`]
//! trait, with a PostgreSQL implementation and an in-memory one.

pub mod db;

pub use db::{
    create_record_store, InMemoryUploadRepository, PostgresUploadRepository, UploadRecordStore,
};
