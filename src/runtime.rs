//! Service bootstrap and lifecycle.
//!
//! Selects the storage backend, starts the shortener service with its
//! deletion worker, and runs the graceful shutdown sequence.

use crate::application::services::ShortenerService;
use crate::config::{Config, StorageKind};
use crate::domain::repositories::Storage;
use crate::error::AppError;
use crate::infrastructure::persistence::{FileStorage, PgStorage};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Shortener service backed by whichever storage was configured.
pub type DynShortenerService = ShortenerService<dyn Storage>;

/// A started service together with what is needed to stop it.
pub struct Runtime {
    service: Arc<DynShortenerService>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
}

impl Runtime {
    /// Shared handle for request handlers.
    pub fn service(&self) -> Arc<DynShortenerService> {
        self.service.clone()
    }

    /// Cancels the deletion worker and waits for its final flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush does not finish within the shutdown timeout.
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("Shutting down");
        self.shutdown.cancel();

        tokio::time::timeout(self.shutdown_timeout, self.service.shutdown())
            .await
            .with_context(|| {
                format!(
                    "Deletion worker did not stop within {}s",
                    self.shutdown_timeout.as_secs()
                )
            })?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Builds the storage backend selected by the configuration.
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail, or the
/// storage files cannot be read.
pub async fn build_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match &config.storage {
        StorageKind::Postgres { dsn } => {
            let storage = PgStorage::connect(
                dsn,
                config.db_max_connections,
                Duration::from_secs(config.context_timeout_secs),
            )
            .await
            .context("Failed to initialize database storage")?;
            tracing::info!("Storage: PostgreSQL");
            Arc::new(storage)
        }
        StorageKind::File {
            records_path,
            user_urls_path,
        } => {
            let storage = FileStorage::open(Some(records_path.clone()), user_urls_path.clone())
                .await
                .context("Failed to initialize file storage")?;
            tracing::info!("Storage: file");
            Arc::new(storage)
        }
        StorageKind::Memory => {
            tracing::info!("Storage: in memory");
            Arc::new(FileStorage::in_memory())
        }
    };

    Ok(storage)
}

/// Builds storage and starts the shortener service.
///
/// # Errors
///
/// Returns an error if the storage cannot be initialized or does not answer
/// a ping.
pub async fn bootstrap(config: &Config) -> Result<Runtime> {
    let storage = build_storage(config).await?;

    match storage.ping().await {
        Ok(()) => tracing::info!("Storage reachable"),
        Err(AppError::Unsupported { .. }) => tracing::debug!("Storage has no ping"),
        Err(e) => return Err(e).context("Storage ping failed"),
    }

    let shutdown = CancellationToken::new();
    let service = Arc::new(ShortenerService::new(
        storage,
        config.service_config(),
        shutdown.clone(),
    ));
    tracing::info!("Deletion worker started");

    Ok(Runtime {
        service,
        shutdown,
        shutdown_timeout: config.shutdown_timeout(),
    })
}

/// Runs the service until SIGINT or SIGTERM, then shuts it down.
///
/// # Errors
///
/// Returns an error if bootstrap fails or shutdown times out.
pub async fn run(config: Config) -> Result<()> {
    let runtime = bootstrap(&config).await?;
    tracing::info!(base_url = %config.base_url, "Service ready");

    shutdown_signal().await;

    runtime.shutdown().await
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
