//! Storage trait definitions for the domain layer.
//!
//! The [`Storage`] trait abstracts persistence of shortened URLs and their
//! ownership links. Implementations live in `crate::infrastructure::persistence`;
//! a mock is generated via `mockall` for unit tests.
//!
//! # Testing
//!
//! See integration tests in `tests/storage_*.rs` for usage examples.

pub mod storage;

pub use storage::{DeleteBatch, Storage, WRITE_CHUNK_SIZE};

#[cfg(test)]
pub use storage::MockStorage;
