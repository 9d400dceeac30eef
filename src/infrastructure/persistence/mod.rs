//! Storage backends.
//!
//! - [`FileStorage`] - JSON lines files with an in-memory index
//! - [`PgStorage`] - PostgreSQL via SQLx

pub mod file_storage;
pub mod jsonl;
pub mod pg_storage;

pub use file_storage::FileStorage;
pub use pg_storage::PgStorage;
