//! Deletion task model for asynchronous batch deletion.

use crate::domain::entities::UserId;

/// Maximum number of short keys carried by a single task.
pub const DELETION_CHUNK_SIZE: usize = 20;

/// A request to delete up to [`DELETION_CHUNK_SIZE`] short keys owned by one user.
///
/// Created by [`crate::application::services::ShortenerService::delete_user_shortened_urls`],
/// sent over a bounded channel and consumed exactly once by
/// [`crate::domain::deletion_worker::run_deletion_worker`]. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTask {
    pub user_id: UserId,
    pub keys: Vec<String>,
}

impl DeletionTask {
    pub fn new(user_id: UserId, keys: Vec<String>) -> Self {
        Self { user_id, keys }
    }

    /// Splits `keys` into tasks of at most [`DELETION_CHUNK_SIZE`] keys,
    /// preserving order. The last task carries the remainder.
    pub fn chunked(user_id: UserId, keys: Vec<String>) -> Vec<Self> {
        keys.chunks(DELETION_CHUNK_SIZE)
            .map(|chunk| Self::new(user_id, chunk.to_vec()))
            .collect()
    }
}
