//! Shortening, lookup and asynchronous deletion service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::deletion_task::DeletionTask;
use crate::domain::deletion_worker::{DeletionWorkerConfig, run_deletion_worker};
use crate::domain::entities::{ShortenedUrl, UserId, UserUrl};
use crate::domain::repositories::Storage;
use crate::error::{AppError, UniqueKey};
use crate::utils::key_generator::{KeyGenerator, RandomKeyGenerator};

/// Attempts at finding an unused short key before giving up.
const MAX_KEY_ATTEMPTS: usize = 10;

/// Settings for [`ShortenerService`].
#[derive(Debug, Clone)]
pub struct ShortenerServiceConfig {
    /// Prefix used by [`ShortenerService::short_url`].
    pub base_url: String,
    /// Upper bound for every storage call made on behalf of a caller.
    pub operation_timeout: Duration,
    /// Capacity of the deletion channel; a full channel blocks callers.
    pub deletion_queue_capacity: usize,
    pub worker: DeletionWorkerConfig,
}

impl Default for ShortenerServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            operation_timeout: Duration::from_secs(30),
            deletion_queue_capacity: 100,
            worker: DeletionWorkerConfig::default(),
        }
    }
}

/// Outcome of [`ShortenerService::create_shortened_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// A new record was written.
    Created(ShortenedUrl),
    /// The original URL was already shortened; this is the stored record.
    Existing(ShortenedUrl),
}

impl Shortened {
    pub fn url(&self) -> &ShortenedUrl {
        match self {
            Self::Created(url) | Self::Existing(url) => url,
        }
    }

    pub fn into_inner(self) -> ShortenedUrl {
        match self {
            Self::Created(url) | Self::Existing(url) => url,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, Self::Existing(_))
    }

    /// Turns [`Shortened::Existing`] into [`AppError::Conflict`] carrying the
    /// existing short key.
    pub fn conflict(self) -> Result<ShortenedUrl, AppError> {
        match self {
            Self::Created(url) => Ok(url),
            Self::Existing(url) => Err(AppError::conflict(
                "Original URL already shortened",
                json!({ "short_url": url.short_url, "original_url": url.original_url }),
            )),
        }
    }
}

/// Service for creating, resolving and deleting shortened URLs.
///
/// Owns the deletion worker: construction spawns it, [`Self::shutdown`] stops
/// it after a final flush. Dropping the service closes the channel, which also
/// makes the worker flush and exit.
pub struct ShortenerService<S, K = RandomKeyGenerator>
where
    S: Storage + ?Sized,
    K: KeyGenerator,
{
    storage: Arc<S>,
    key_generator: K,
    base_url: String,
    operation_timeout: Duration,
    deletion_tx: mpsc::Sender<DeletionTask>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S> ShortenerService<S, RandomKeyGenerator>
where
    S: Storage + ?Sized + 'static,
{
    /// Creates the service and spawns its deletion worker.
    ///
    /// Must be called from within a Tokio runtime. Cancelling `shutdown`
    /// makes the worker flush and stop.
    pub fn new(storage: Arc<S>, config: ShortenerServiceConfig, shutdown: CancellationToken) -> Self {
        Self::with_key_generator(storage, RandomKeyGenerator, config, shutdown)
    }
}

impl<S, K> ShortenerService<S, K>
where
    S: Storage + ?Sized + 'static,
    K: KeyGenerator,
{
    /// Same as [`ShortenerService::new`] with a custom key source.
    pub fn with_key_generator(
        storage: Arc<S>,
        key_generator: K,
        config: ShortenerServiceConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let (deletion_tx, deletion_rx) = mpsc::channel(config.deletion_queue_capacity.max(1));

        let worker = tokio::spawn(
            run_deletion_worker(deletion_rx, storage.clone(), config.worker, shutdown.clone())
                .instrument(tracing::info_span!("deletion_worker")),
        );

        Self {
            storage,
            key_generator,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            operation_timeout: config.operation_timeout,
            deletion_tx,
            shutdown,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Shortens `original_url`, linking it to `user_id` when present.
    ///
    /// # Deduplication
    ///
    /// If the original URL is already stored, the existing record is linked to
    /// the caller and returned as [`Shortened::Existing`]; no new key is made.
    ///
    /// # Key Collisions
    ///
    /// A collision on the generated key is retried with a fresh key, up to 10
    /// attempts.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if `original_url` is blank
    /// - [`AppError::KeyGeneration`] if no key could be produced
    /// - [`AppError::Timeout`] if a storage call exceeds the operation timeout
    /// - [`AppError::Internal`] on storage failure or too many collisions
    pub async fn create_shortened_url(
        &self,
        user_id: Option<UserId>,
        original_url: &str,
    ) -> Result<Shortened, AppError> {
        if original_url.trim().is_empty() {
            return Err(AppError::bad_request("Original URL is empty", json!({})));
        }

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            let url = ShortenedUrl::new(Uuid::new_v4(), self.next_key()?, original_url.to_string());

            match self
                .bounded("write shortened URL", self.storage.write_shortened_url(&url))
                .await
            {
                Ok(()) => {
                    self.link_owner(user_id, &url).await?;
                    tracing::debug!(short_url = %url.short_url, "Shortened URL created");
                    return Ok(Shortened::Created(url));
                }
                Err(e) if e.is_unique_violation_on(UniqueKey::OriginalUrl) => {
                    let existing = self.existing_for(original_url).await?;
                    self.link_owner(user_id, &existing).await?;
                    tracing::debug!(short_url = %existing.short_url, "Original URL already shortened");
                    return Ok(Shortened::Existing(existing));
                }
                Err(e) if e.is_unique_violation_on(UniqueKey::ShortUrl) => {
                    tracing::warn!(attempt, "key collision, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::internal(
            "Failed to generate unique key",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Resolves a short key (or original URL) to its record.
    ///
    /// Deleted records are returned as-is; callers check
    /// `is_deleted`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if nothing matches `key`.
    pub async fn get_shortened_url(&self, key: &str) -> Result<ShortenedUrl, AppError> {
        self.bounded("read shortened URL", self.storage.read_shortened_url(key))
            .await?
            .ok_or_else(|| AppError::not_found("Shortened URL not found", json!({ "key": key })))
    }

    /// Assigns a fresh identity and key to every item and stores them all.
    ///
    /// Caller-supplied keys are overwritten. The output keeps input order and
    /// correlation ids. Nothing is stored if any item fails.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if an item has a blank original URL
    /// - [`AppError::UniqueViolation`] if an original URL or correlation id is
    ///   already stored
    pub async fn batch_create_shortened_urls(
        &self,
        mut urls: Vec<ShortenedUrl>,
    ) -> Result<Vec<ShortenedUrl>, AppError> {
        if urls.is_empty() {
            return Ok(urls);
        }

        if let Some(index) = urls.iter().position(|u| u.original_url.trim().is_empty()) {
            return Err(AppError::bad_request(
                "Original URL is empty",
                json!({ "index": index }),
            ));
        }

        for attempt in 1..=MAX_KEY_ATTEMPTS {
            for url in urls.iter_mut() {
                url.uuid = Uuid::new_v4();
                url.short_url = self.next_key()?;
                url.is_deleted = false;
            }

            match self
                .bounded(
                    "write shortened URL batch",
                    self.storage.write_batch_shortened_urls(&urls),
                )
                .await
            {
                Ok(()) => {
                    tracing::debug!(count = urls.len(), "Shortened URL batch created");
                    return Ok(urls);
                }
                Err(e) if e.is_unique_violation_on(UniqueKey::ShortUrl) => {
                    tracing::warn!(attempt, "key collision in batch, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::internal(
            "Failed to generate unique keys",
            json!({ "reason": "Too many collisions" }),
        ))
    }

    /// Returns every record the user owns, deleted ones included.
    pub async fn get_user_shortened_urls(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ShortenedUrl>, AppError> {
        self.bounded("read user URLs", self.storage.read_user_urls(user_id))
            .await
    }

    /// Accepts a deletion request without touching storage.
    ///
    /// Keys are split into tasks of 20 and queued for the deletion worker.
    /// Waits only while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unavailable`] if the worker has shut down.
    pub async fn delete_user_shortened_urls(
        &self,
        user_id: UserId,
        keys: Vec<String>,
    ) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        let tasks = DeletionTask::chunked(user_id, keys);
        let count = tasks.len();
        for task in tasks {
            self.deletion_tx
                .send(task)
                .await
                .map_err(|_| AppError::unavailable("Deletion pipeline is shut down"))?;
        }

        tracing::debug!(%user_id, tasks = count, "Deletion accepted");
        Ok(())
    }

    /// Checks that storage is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.bounded("ping storage", self.storage.ping()).await
    }

    /// Builds the public short URL for a key.
    pub fn short_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Stops the deletion worker after it flushed everything queued so far.
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "Deletion worker terminated abnormally");
        }
    }

    fn next_key(&self) -> Result<String, AppError> {
        let key = self.key_generator.generate()?;
        if key.is_empty() {
            return Err(AppError::key_generation("Key generator returned an empty key"));
        }
        Ok(key)
    }

    async fn existing_for(&self, original_url: &str) -> Result<ShortenedUrl, AppError> {
        self.bounded(
            "read conflicting shortened URL",
            self.storage.read_shortened_url_by_original(original_url),
        )
        .await?
        .ok_or_else(|| {
            AppError::internal(
                "Conflicting shortened URL not found",
                json!({ "original_url": original_url }),
            )
        })
    }

    async fn link_owner(&self, user_id: Option<UserId>, url: &ShortenedUrl) -> Result<(), AppError> {
        let Some(user_id) = user_id else {
            return Ok(());
        };
        let user_url = UserUrl::new(user_id, url.uuid);
        self.bounded("create user URL", self.storage.create_user_url(&user_url))
            .await
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::timeout(format!("Timed out: {operation}"))),
        }
    }
}
