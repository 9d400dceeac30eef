//! File-backed implementation of the storage trait.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::entities::{ShortenedUrl, UserId, UserUrl};
use crate::domain::repositories::{DeleteBatch, Storage};
use crate::error::{AppError, UniqueKey};
use crate::infrastructure::persistence::jsonl;

/// Storage that appends JSON lines to two files and serves reads from an
/// in-memory index.
///
/// Records live in one file, ownership links in another. Deletion appends the
/// updated record; on load, the last line for a uuid wins. Without paths the
/// storage is purely in-memory.
///
/// Every operation, reads included, runs under one async mutex. The index is
/// only updated after the append succeeded.
pub struct FileStorage {
    state: Mutex<FileState>,
}

#[derive(Default)]
struct FileState {
    records_path: Option<PathBuf>,
    user_urls_path: Option<PathBuf>,
    records: HashMap<Uuid, ShortenedUrl>,
    by_short_url: HashMap<String, Uuid>,
    by_original_url: HashMap<String, Uuid>,
    correlation_ids: HashSet<String>,
    owners: HashMap<UserId, Vec<Uuid>>,
}

impl FileState {
    fn check_unique(&self, url: &ShortenedUrl) -> Result<(), AppError> {
        if self.by_original_url.contains_key(&url.original_url) {
            return Err(AppError::UniqueViolation(UniqueKey::OriginalUrl));
        }
        if self.by_short_url.contains_key(&url.short_url) {
            return Err(AppError::UniqueViolation(UniqueKey::ShortUrl));
        }
        if let Some(cid) = &url.correlation_id
            && self.correlation_ids.contains(cid)
        {
            return Err(AppError::UniqueViolation(UniqueKey::CorrelationId));
        }
        Ok(())
    }

    fn index(&mut self, url: ShortenedUrl) {
        if let Some(previous) = self.records.get(&url.uuid) {
            self.by_short_url.remove(&previous.short_url);
            self.by_original_url.remove(&previous.original_url);
            if let Some(cid) = &previous.correlation_id {
                self.correlation_ids.remove(cid);
            }
        }
        self.by_short_url.insert(url.short_url.clone(), url.uuid);
        self.by_original_url.insert(url.original_url.clone(), url.uuid);
        if let Some(cid) = &url.correlation_id {
            self.correlation_ids.insert(cid.clone());
        }
        self.records.insert(url.uuid, url);
    }

    fn link(&mut self, user_url: &UserUrl) -> bool {
        let owned = self.owners.entry(user_url.user_id).or_default();
        if owned.contains(&user_url.shortened_url_uuid) {
            return false;
        }
        owned.push(user_url.shortened_url_uuid);
        true
    }

    fn is_linked(&self, user_url: &UserUrl) -> bool {
        self.owners
            .get(&user_url.user_id)
            .is_some_and(|owned| owned.contains(&user_url.shortened_url_uuid))
    }
}

impl FileStorage {
    /// Creates a storage that keeps everything in memory.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(FileState::default()),
        }
    }

    /// Opens (or creates) the record and ownership files and loads the index.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if a file cannot be read or a parent
    /// directory cannot be created.
    pub async fn open(
        records_path: Option<PathBuf>,
        user_urls_path: Option<PathBuf>,
    ) -> Result<Self, AppError> {
        let mut state = FileState::default();

        if let Some(path) = &records_path {
            jsonl::ensure_parent(path).await?;
            let lines: Vec<ShortenedUrl> = jsonl::read_all(path).await?;
            for url in lines {
                state.index(url);
            }
        }

        if let Some(path) = &user_urls_path {
            jsonl::ensure_parent(path).await?;
            let links: Vec<UserUrl> = jsonl::read_all(path).await?;
            for link in &links {
                state.link(link);
            }
        }

        tracing::info!(
            records = state.records.len(),
            users = state.owners.len(),
            records_path = ?records_path,
            user_urls_path = ?user_urls_path,
            "File storage loaded"
        );

        state.records_path = records_path;
        state.user_urls_path = user_urls_path;

        Ok(Self {
            state: Mutex::new(state),
        })
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn write_shortened_url(&self, url: &ShortenedUrl) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state.check_unique(url)?;

        if let Some(path) = &state.records_path {
            jsonl::append(path, std::slice::from_ref(url)).await?;
        }
        state.index(url.clone());

        Ok(())
    }

    async fn read_shortened_url(&self, key: &str) -> Result<Option<ShortenedUrl>, AppError> {
        let state = self.state.lock().await;

        let uuid = state
            .by_short_url
            .get(key)
            .or_else(|| state.by_original_url.get(key));

        Ok(uuid.and_then(|id| state.records.get(id)).cloned())
    }

    async fn read_shortened_url_by_original(
        &self,
        original_url: &str,
    ) -> Result<Option<ShortenedUrl>, AppError> {
        let state = self.state.lock().await;

        Ok(state
            .by_original_url
            .get(original_url)
            .and_then(|id| state.records.get(id))
            .cloned())
    }

    async fn write_batch_shortened_urls(&self, urls: &[ShortenedUrl]) -> Result<(), AppError> {
        if urls.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock().await;

        let mut originals = HashSet::with_capacity(urls.len());
        let mut shorts = HashSet::with_capacity(urls.len());
        let mut correlations = HashSet::new();
        for url in urls {
            state.check_unique(url)?;
            if !originals.insert(url.original_url.as_str()) {
                return Err(AppError::UniqueViolation(UniqueKey::OriginalUrl));
            }
            if !shorts.insert(url.short_url.as_str()) {
                return Err(AppError::UniqueViolation(UniqueKey::ShortUrl));
            }
            if let Some(cid) = &url.correlation_id
                && !correlations.insert(cid.as_str())
            {
                return Err(AppError::UniqueViolation(UniqueKey::CorrelationId));
            }
        }

        if let Some(path) = &state.records_path {
            jsonl::append(path, urls).await?;
        }
        for url in urls {
            state.index(url.clone());
        }

        Ok(())
    }

    async fn create_user_url(&self, user_url: &UserUrl) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        if !state.records.contains_key(&user_url.shortened_url_uuid) {
            return Err(AppError::not_found(
                "Shortened URL not found",
                json!({ "uuid": user_url.shortened_url_uuid }),
            ));
        }
        if state.is_linked(user_url) {
            return Ok(());
        }

        if let Some(path) = &state.user_urls_path {
            jsonl::append(path, std::slice::from_ref(user_url)).await?;
        }
        state.link(user_url);

        Ok(())
    }

    async fn read_user_urls(&self, user_id: UserId) -> Result<Vec<ShortenedUrl>, AppError> {
        let state = self.state.lock().await;

        Ok(state
            .owners
            .get(&user_id)
            .map(|owned| {
                owned
                    .iter()
                    .filter_map(|id| state.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_bulk(&self, batch: DeleteBatch) -> Result<(), AppError> {
        let mut state = self.state.lock().await;

        let mut touched = HashSet::new();
        let mut updated = Vec::new();
        for (user_id, keys) in &batch {
            let Some(owned) = state.owners.get(user_id) else {
                continue;
            };
            for key in keys {
                let Some(id) = state.by_short_url.get(key) else {
                    continue;
                };
                if !owned.contains(id) || !touched.insert(*id) {
                    continue;
                }
                if let Some(record) = state.records.get(id)
                    && !record.is_deleted
                {
                    let mut record = record.clone();
                    record.is_deleted = true;
                    updated.push(record);
                }
            }
        }

        if updated.is_empty() {
            return Ok(());
        }

        if let Some(path) = &state.records_path {
            jsonl::append(path, &updated).await?;
        }
        let count = updated.len();
        for record in updated {
            state.index(record);
        }
        tracing::debug!(count, "Marked shortened URLs deleted");

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Err(AppError::unsupported("File storage doesn't support ping"))
    }
}
