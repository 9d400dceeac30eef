//! Storage trait for shortened URLs and their ownership links.

use std::collections::HashMap;

use crate::domain::entities::{ShortenedUrl, UserId, UserUrl};
use crate::error::AppError;
use async_trait::async_trait;

/// Short keys to mark deleted, grouped by the user that requested it.
pub type DeleteBatch = HashMap<UserId, Vec<String>>;

/// Number of records written per statement/append in batch operations.
pub const WRITE_CHUNK_SIZE: usize = 20;

/// Persistence capability consumed by the shortener service.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::FileStorage`] - JSON lines on local disk
/// - [`crate::infrastructure::persistence::PgStorage`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
///
/// The backend is chosen once at startup and used as `Arc<dyn Storage>`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists a new record atomically.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::UniqueViolation`] naming the violated key when the
    /// original URL, short key or correlation id is already stored.
    ///
    /// Returns [`AppError::Internal`] on I/O or database errors.
    async fn write_shortened_url(&self, url: &ShortenedUrl) -> Result<(), AppError>;

    /// Finds a record by short key, or by original URL when no short key
    /// matches.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ShortenedUrl))` if found, deleted or not
    /// - `Ok(None)` if not found
    async fn read_shortened_url(&self, key: &str) -> Result<Option<ShortenedUrl>, AppError>;

    /// Finds a record by original URL only, ignoring short keys.
    async fn read_shortened_url_by_original(
        &self,
        original_url: &str,
    ) -> Result<Option<ShortenedUrl>, AppError>;

    /// Inserts all records or none of them.
    ///
    /// Writes are chunked by [`WRITE_CHUNK_SIZE`] inside one transaction.
    async fn write_batch_shortened_urls(&self, urls: &[ShortenedUrl]) -> Result<(), AppError>;

    /// Records that `user_url.user_id` owns a shortened URL.
    ///
    /// Linking an already linked pair is a no-op.
    async fn create_user_url(&self, user_url: &UserUrl) -> Result<(), AppError>;

    /// Returns every record owned by the user, including deleted ones.
    async fn read_user_urls(&self, user_id: UserId) -> Result<Vec<ShortenedUrl>, AppError>;

    /// Marks the records behind each (user, key) pair as deleted.
    ///
    /// Keys the user does not own are left untouched. Deleting an already
    /// deleted record is not an error.
    async fn delete_bulk(&self, batch: DeleteBatch) -> Result<(), AppError>;

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unsupported`] for backends without a liveness check.
    async fn ping(&self) -> Result<(), AppError>;
}
