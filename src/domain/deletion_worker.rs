//! Background consumer that coalesces deletion tasks and flushes them to storage.
//!
//! The worker is the only owner of the buffer, so the size trigger, the timer
//! trigger and the final shutdown flush are serialized through one loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::deletion_task::DeletionTask;
use crate::domain::repositories::{DeleteBatch, Storage};

/// Flush thresholds for the deletion worker.
#[derive(Debug, Clone, Copy)]
pub struct DeletionWorkerConfig {
    /// Buffered tasks (or keys) that trigger an immediate flush.
    pub batch_size: usize,
    /// Period of the timer flush for a non-empty buffer.
    pub flush_interval: Duration,
}

impl Default for DeletionWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            flush_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FlushReason {
    Threshold,
    Timer,
    Shutdown,
}

/// Per-user accumulation of pending deletions.
#[derive(Debug, Default)]
struct DeletionBuffer {
    batch: DeleteBatch,
    tasks: usize,
    keys: usize,
}

impl DeletionBuffer {
    fn push(&mut self, task: DeletionTask) {
        if task.keys.is_empty() {
            return;
        }
        self.tasks += 1;
        self.keys += task.keys.len();
        self.batch.entry(task.user_id).or_default().extend(task.keys);
    }

    fn is_empty(&self) -> bool {
        self.tasks == 0
    }

    fn is_full(&self, batch_size: usize) -> bool {
        self.tasks >= batch_size || self.keys >= batch_size
    }

    fn take(&mut self) -> DeleteBatch {
        self.tasks = 0;
        self.keys = 0;
        std::mem::take(&mut self.batch)
    }
}

/// Runs until `shutdown` is cancelled or every sender is dropped.
///
/// On either event, tasks still queued in the channel are drained into the
/// buffer and flushed once before returning. Flush errors are logged and not
/// retried; deletion is idempotent, so the caller may resubmit.
pub async fn run_deletion_worker<S>(
    mut rx: mpsc::Receiver<DeletionTask>,
    storage: Arc<S>,
    config: DeletionWorkerConfig,
    shutdown: CancellationToken,
) where
    S: Storage + ?Sized,
{
    let batch_size = config.batch_size.max(1);
    let period = config.flush_interval.max(Duration::from_millis(1));
    let mut buffer = DeletionBuffer::default();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        batch_size,
        flush_interval_ms = period.as_millis() as u64,
        "Deletion worker started"
    );

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                rx.close();
                while let Some(task) = rx.recv().await {
                    buffer.push(task);
                }
                flush(storage.as_ref(), &mut buffer, FlushReason::Shutdown).await;
                break;
            }

            task = rx.recv() => match task {
                Some(task) => {
                    buffer.push(task);
                    if buffer.is_full(batch_size) {
                        flush(storage.as_ref(), &mut buffer, FlushReason::Threshold).await;
                    }
                }
                None => {
                    flush(storage.as_ref(), &mut buffer, FlushReason::Shutdown).await;
                    break;
                }
            },

            _ = ticker.tick() => {
                flush(storage.as_ref(), &mut buffer, FlushReason::Timer).await;
            }
        }
    }

    tracing::info!("Deletion worker stopped");
}

async fn flush<S>(storage: &S, buffer: &mut DeletionBuffer, reason: FlushReason)
where
    S: Storage + ?Sized,
{
    if buffer.is_empty() {
        return;
    }

    let tasks = buffer.tasks;
    let keys = buffer.keys;
    let batch = buffer.take();
    let users = batch.len();

    match storage.delete_bulk(batch).await {
        Ok(()) => tracing::debug!(?reason, tasks, keys, users, "Flushed deletions"),
        Err(e) => tracing::error!(
            ?reason,
            tasks,
            keys,
            users,
            error = %e,
            "Failed to flush deletions"
        ),
    }
}
