#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url_shortener_core::prelude::*;
use uuid::Uuid;

pub const LONG_INTERVAL: Duration = Duration::from_secs(3600);

pub fn service_config(batch_size: usize, flush_interval: Duration) -> ShortenerServiceConfig {
    ShortenerServiceConfig {
        base_url: "http://localhost:8080".to_string(),
        operation_timeout: Duration::from_secs(5),
        deletion_queue_capacity: 100,
        worker: DeletionWorkerConfig {
            batch_size,
            flush_interval,
        },
    }
}

/// In-memory storage plus a service over it. The storage handle lets tests
/// observe flushes without going through the service.
pub fn memory_service(
    config: ShortenerServiceConfig,
) -> (Arc<FileStorage>, ShortenerService<FileStorage>) {
    let storage = Arc::new(FileStorage::in_memory());
    let service = ShortenerService::new(storage.clone(), config, CancellationToken::new());
    (storage, service)
}

pub fn record(short_url: &str, original_url: &str) -> ShortenedUrl {
    ShortenedUrl::new(Uuid::new_v4(), short_url.to_string(), original_url.to_string())
}

pub fn keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}{i:04}")).collect()
}

pub async fn is_deleted<S: Storage + ?Sized>(storage: &S, key: &str) -> bool {
    storage
        .read_shortened_url(key)
        .await
        .unwrap()
        .is_some_and(|url| url.is_deleted)
}

/// Polls `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
