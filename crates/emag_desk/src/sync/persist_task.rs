//! Background writer for imported rows.
//!
//! Fetch tasks push rows into an mpsc channel; the persist task groups them
//! into batches and inserts each batch with dedupe on
//! `(integration_id, emag_id)`.
//!
//! ```text
//! page fetch → window filter → row channel → persist task → database
//! ```
//!
//! A batch is flushed when it reaches the batch size, when the flush
//! interval elapses with rows pending, when every sender is dropped, and on
//! shutdown. Write errors are collected instead of aborting the task.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use sea_orm::DatabaseConnection;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};

use crate::platform::Resource;
use crate::repository::{ImportRow, InsertOutcome};

use super::progress::{ProgressCallback, SyncEvent};

/// Rows per insert statement.
pub const PERSIST_BATCH_SIZE: usize = 500;

/// Longest a partial batch waits mid-stream before it is flushed.
pub const PERSIST_FLUSH_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

/// How long to wait for the task once every sender is gone. Hitting it means
/// a sender leaked.
pub const PERSIST_TASK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub const PERSIST_RETRY_ATTEMPTS: u32 = 3;

pub const PERSIST_RETRY_BACKOFF_MS: u64 = 100;

/// Buffer of the row channel.
pub const ROW_CHANNEL_BUFFER_SIZE: usize = 500;

/// What the persist task wrote and what it failed to write.
#[derive(Debug, Default)]
#[must_use = "PersistTaskResult may contain errors that should be checked"]
pub struct PersistTaskResult {
    pub outcome: InsertOutcome,
    /// One entry per failed batch: rows in the batch and the error.
    pub errors: Vec<(usize, String)>,
    /// Set when the task panicked, was cancelled or timed out.
    pub panic_info: Option<String>,
}

impl PersistTaskResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.panic_info.is_some()
    }

    /// Rows that were sent but never written.
    pub fn failed_count(&self) -> usize {
        self.errors.iter().map(|(count, _)| count).sum()
    }

    /// First error, for status messages.
    pub fn first_error(&self) -> Option<String> {
        self.panic_info
            .clone()
            .or_else(|| self.errors.first().map(|(_, e)| e.clone()))
    }
}

/// Handle to a running persist task.
pub struct PersistHandle {
    handle: tokio::task::JoinHandle<PersistTaskResult>,
    inserted: Arc<AtomicU64>,
}

impl PersistHandle {
    /// Rows inserted so far.
    pub fn inserted_so_far(&self) -> u64 {
        self.inserted.load(Ordering::Relaxed)
    }
}

struct Flusher<'a> {
    db: &'a DatabaseConnection,
    resource: Resource,
    result: PersistTaskResult,
    inserted: &'a AtomicU64,
    on_progress: Option<&'a ProgressCallback>,
    batches: u64,
}

impl Flusher<'_> {
    async fn flush<A: ImportRow>(&mut self, batch: Vec<A>, is_final: bool) {
        if batch.is_empty() {
            return;
        }
        self.batches += 1;
        let batch_size = batch.len();

        if let Some(cb) = self.on_progress {
            cb(SyncEvent::PersistingBatch {
                resource: self.resource,
                count: batch_size,
                final_batch: is_final,
            });
        }

        let flush_start = std::time::Instant::now();
        match A::insert_batch(
            self.db,
            batch,
            PERSIST_RETRY_ATTEMPTS,
            PERSIST_RETRY_BACKOFF_MS,
        )
        .await
        {
            Ok(outcome) => {
                tracing::debug!(
                    resource = %self.resource,
                    batch_size,
                    inserted = outcome.inserted,
                    skipped = outcome.skipped,
                    final_batch = is_final,
                    elapsed_ms = flush_start.elapsed().as_millis(),
                    "Persisted batch"
                );
                self.result.outcome += outcome;
                self.inserted.fetch_add(outcome.inserted, Ordering::Relaxed);
                if let Some(cb) = self.on_progress {
                    cb(SyncEvent::Persisted {
                        resource: self.resource,
                        inserted: outcome.inserted,
                        skipped: outcome.skipped,
                    });
                }
            }
            Err(e) => {
                tracing::warn!(
                    resource = %self.resource,
                    batch_size,
                    final_batch = is_final,
                    elapsed_ms = flush_start.elapsed().as_millis(),
                    error = %e,
                    "Failed to persist batch"
                );
                let error = e.to_string();
                self.result.errors.push((batch_size, error.clone()));
                if let Some(cb) = self.on_progress {
                    cb(SyncEvent::PersistError {
                        resource: self.resource,
                        count: batch_size,
                        error,
                    });
                }
            }
        }
    }
}

/// Spawn a task that writes rows from `rx` in deduped batches of
/// `batch_size` (`PERSIST_BATCH_SIZE` when zero).
///
/// The task stops when the channel closes or the shutdown flag is raised,
/// flushing whatever it holds first.
pub fn spawn_persist_task<A: ImportRow>(
    db: Arc<DatabaseConnection>,
    resource: Resource,
    mut rx: mpsc::Receiver<A>,
    batch_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    on_progress: Option<Arc<ProgressCallback>>,
) -> PersistHandle {
    let batch_size = if batch_size == 0 {
        PERSIST_BATCH_SIZE
    } else {
        batch_size
    };
    let inserted = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&inserted);

    let handle = tokio::spawn(async move {
        let task_start = std::time::Instant::now();
        let mut flusher = Flusher {
            db: &db,
            resource,
            result: PersistTaskResult::default(),
            inserted: &counter,
            on_progress: on_progress.as_deref(),
            batches: 0,
        };

        let mut batch: Vec<A> = Vec::with_capacity(batch_size);
        let mut flush_interval = interval_at(
            Instant::now() + PERSIST_FLUSH_TIMEOUT,
            PERSIST_FLUSH_TIMEOUT,
        );

        loop {
            if shutdown_flag
                .as_ref()
                .is_some_and(|f| f.load(Ordering::Relaxed))
            {
                tracing::debug!(resource = %resource, "Shutdown requested, flushing final batch");
                flusher.flush(std::mem::take(&mut batch), true).await;
                break;
            }

            tokio::select! {
                biased;

                item = rx.recv() => match item {
                    Some(row) => {
                        batch.push(row);
                        if batch.len() >= batch_size {
                            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                            flusher.flush(full, false).await;
                            flush_interval.reset();
                        }
                    }
                    None => {
                        flusher.flush(std::mem::take(&mut batch), true).await;
                        break;
                    }
                },

                _ = flush_interval.tick(), if !batch.is_empty() => {
                    tracing::debug!(batch_size = batch.len(), "Flushing partial batch");
                    let partial = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                    flusher.flush(partial, false).await;
                }
            }
        }

        tracing::debug!(
            resource = %resource,
            batches = flusher.batches,
            inserted = flusher.result.outcome.inserted,
            skipped = flusher.result.outcome.skipped,
            errors = flusher.result.errors.len(),
            elapsed_ms = task_start.elapsed().as_millis(),
            "Persist task completed"
        );
        flusher.result
    });

    PersistHandle { handle, inserted }
}

fn describe_join_error(e: tokio::task::JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        }
    } else if e.is_cancelled() {
        "Task was cancelled".to_string()
    } else {
        format!("Task failed: {e}")
    }
}

/// Wait for the persist task, aborting it after `PERSIST_TASK_TIMEOUT`.
pub async fn await_persist_task(persist: PersistHandle) -> PersistTaskResult {
    let mut handle = persist.handle;

    tokio::select! {
        joined = &mut handle => match joined {
            Ok(result) => result,
            Err(e) => {
                let panic_info = describe_join_error(e);
                tracing::error!(panic_info = %panic_info, "Persist task failed");
                PersistTaskResult {
                    panic_info: Some(panic_info),
                    ..PersistTaskResult::default()
                }
            }
        },
        _ = tokio::time::sleep(PERSIST_TASK_TIMEOUT) => {
            handle.abort();
            tracing::error!(
                timeout_secs = PERSIST_TASK_TIMEOUT.as_secs(),
                "Persist task timed out"
            );
            PersistTaskResult {
                panic_info: Some(format!(
                    "Persist task timed out after {}s",
                    PERSIST_TASK_TIMEOUT.as_secs()
                )),
                ..PersistTaskResult::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult, Set};
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::entity::order;

    fn row(emag_id: i64) -> order::ActiveModel {
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(Uuid::nil()),
            emag_id: Set(emag_id),
            status: Set(4),
            order_type: Set(Some(order::ORDER_TYPE_FBE)),
            payment_mode_id: Set(None),
            customer_name: Set(None),
            product_count: Set(1),
            total: Set("49.99".to_string()),
            currency: Set(Some("RON".to_string())),
            ordered_at: Set(NaiveDate::from_ymd_opt(2025, 2, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap()),
            modified_at: Set(None),
            payload: Set(serde_json::json!({})),
            imported_at: Set(Utc::now().fixed_offset()),
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            rows_affected,
            last_insert_id: 0,
        }
    }

    #[tokio::test]
    async fn flushes_full_batches_and_the_tail() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec(2), exec(0)])
            .into_connection();
        let (tx, rx) = mpsc::channel(8);
        let persist = spawn_persist_task(Arc::new(db), Resource::Orders, rx, 2, None, None);

        for id in 1..=3 {
            tx.send(row(id)).await.expect("send");
        }
        drop(tx);

        let result = await_persist_task(persist).await;
        assert!(!result.has_errors());
        assert_eq!(
            result.outcome,
            InsertOutcome {
                inserted: 2,
                skipped: 1
            }
        );
    }

    #[tokio::test]
    async fn write_errors_are_collected() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_errors([DbErr::Custom("constraint failed".to_string())])
            .into_connection();
        let (tx, rx) = mpsc::channel(8);

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            events_capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });

        let persist = spawn_persist_task(
            Arc::new(db),
            Resource::Orders,
            rx,
            10,
            None,
            Some(Arc::new(callback)),
        );
        tx.send(row(1)).await.expect("send");
        drop(tx);

        let result = await_persist_task(persist).await;
        assert!(result.has_errors());
        assert_eq!(result.failed_count(), 1);
        assert!(
            result
                .first_error()
                .is_some_and(|e| e.contains("constraint failed"))
        );

        let events = events.lock().unwrap_or_else(|e| e.into_inner());
        assert!(
            events
                .iter()
                .any(|e| matches!(e, SyncEvent::PersistError { count: 1, .. }))
        );
    }

    #[tokio::test]
    async fn shutdown_flushes_pending_rows() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([exec(1)])
            .into_connection();
        let (tx, rx) = mpsc::channel(8);
        let shutdown = Arc::new(AtomicBool::new(true));

        tx.send(row(7)).await.expect("send");
        let persist = spawn_persist_task(
            Arc::new(db),
            Resource::Orders,
            rx,
            10,
            Some(Arc::clone(&shutdown)),
            None,
        );

        // the sender stays alive; only the flag ends the task
        let result = await_persist_task(persist).await;
        drop(tx);
        assert!(!result.has_errors());
        assert_eq!(result.outcome.inserted, 0);
    }

    #[test]
    fn failed_count_sums_batches() {
        let result = PersistTaskResult {
            outcome: InsertOutcome::default(),
            errors: vec![(500, "locked".to_string()), (20, "locked".to_string())],
            panic_info: None,
        };
        assert_eq!(result.failed_count(), 520);
    }
}
