use emag_desk::SyncStatus;
use emag_desk::sync::{StatusTransition, SyncEvent};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncEvent) {
        match event {
            SyncEvent::Counting {
                integration,
                resource,
            } => {
                tracing::debug!(integration = %integration, resource = %resource, "Counting records");
            }

            SyncEvent::Counted {
                integration,
                resource,
                total,
                pages,
                window_start,
            } => {
                tracing::info!(
                    integration = %integration,
                    resource = %resource,
                    total,
                    pages,
                    window_start = ?window_start,
                    "Fetching records"
                );
            }

            SyncEvent::FetchedPage {
                integration,
                resource,
                page,
                count,
                fetched_so_far,
                percent,
            } => {
                tracing::debug!(
                    integration = %integration,
                    resource = %resource,
                    page,
                    count,
                    fetched_so_far,
                    percent,
                    "Fetched page"
                );
            }

            SyncEvent::BatchComplete {
                integration,
                resource,
                batch,
                batches,
            } => {
                tracing::debug!(integration = %integration, resource = %resource, batch, batches, "Batch complete");
            }

            SyncEvent::WindowFiltered {
                integration,
                resource,
                dropped,
            } => {
                tracing::debug!(integration = %integration, resource = %resource, dropped, "Dropped records before window");
            }

            SyncEvent::PersistingBatch {
                resource,
                count,
                final_batch,
            } => {
                if final_batch {
                    tracing::info!(resource = %resource, count, "Flushing final persistence batch");
                } else {
                    tracing::debug!(resource = %resource, count, "Flushing persistence batch");
                }
            }

            SyncEvent::Persisted {
                resource,
                inserted,
                skipped,
            } => {
                tracing::debug!(resource = %resource, inserted, skipped, "Saved to database");
            }

            SyncEvent::PersistError {
                resource,
                count,
                error,
            } => {
                tracing::error!(resource = %resource, count, error = %error, "Failed to save");
            }

            SyncEvent::RateLimitBackoff {
                resource,
                page,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(
                    resource = %resource,
                    page,
                    retry_after_ms,
                    attempt,
                    "Rate limited, backing off"
                );
            }

            SyncEvent::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            SyncEvent::ResourceComplete {
                integration,
                resource,
                fetched,
                inserted,
                skipped,
            } => {
                tracing::info!(
                    integration = %integration,
                    resource = %resource,
                    fetched,
                    inserted,
                    skipped,
                    "Resource synced"
                );
            }

            _ => {}
        }
    }

    pub fn status(&self, transition: &StatusTransition) {
        match transition.to {
            SyncStatus::Error => tracing::warn!(
                integration = %transition.integration,
                from = ?transition.from,
                error = transition.error.as_deref().unwrap_or(""),
                "Sync status changed"
            ),
            to => tracing::info!(
                integration = %transition.integration,
                from = ?transition.from,
                to = ?to,
                "Sync status changed"
            ),
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
