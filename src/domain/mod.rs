//! Domain layer containing business entities and logic.
//!
//! Defines entities, the storage interface and the deletion worker,
//! independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Storage trait definition
//! - [`deletion_task`] - Unit of work for the deletion worker
//! - [`deletion_worker`] - Asynchronous batch deletion
//!
//! # Deletion Flow
//!
//! 1. A handler calls [`crate::application::services::ShortenerService::delete_user_shortened_urls`]
//! 2. Keys are split into [`deletion_task::DeletionTask`]s of 20 and sent to a bounded channel
//! 3. [`deletion_worker::run_deletion_worker`] merges tasks per user
//! 4. The merged batch is flushed via [`repositories::Storage::delete_bulk`]

pub mod deletion_task;
pub mod deletion_worker;
pub mod entities;
pub mod repositories;
