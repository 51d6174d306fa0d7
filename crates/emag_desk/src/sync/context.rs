//! Everything one sync run needs, owned for the run's lifetime.
//!
//! ```ignore
//! use emag_desk::sync::{SyncContext, SyncOptions};
//!
//! let ctx = SyncContext::builder()
//!     .options(SyncOptions::default())
//!     .database(db)
//!     .progress(callback)
//!     .build()?;
//!
//! let mut statuses = ctx.subscribe();
//! let report = ctx.sync_integration(Arc::new(client), &integration).await?;
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use sea_orm::DatabaseConnection;
use tokio::sync::broadcast;

use crate::entity::integration::Model as IntegrationModel;
use crate::platform::{MarketplaceClient, PlatformError};

use super::engine::{self, IntegrationSyncResult};
use super::persist_task::PERSIST_BATCH_SIZE;
use super::progress::ProgressCallback;
use super::status::{StatusBus, StatusError, StatusReconciler, StatusTransition};
use super::tracker::ProgressTracker;
use super::types::{SyncError, SyncOptions, SyncReport};

/// Error type for building a [`SyncContext`].
#[derive(Debug, thiserror::Error)]
pub enum SyncContextError {
    /// A required builder field was not set.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Result type for building a [`SyncContext`].
pub type Result<T> = std::result::Result<T, SyncContextError>;

/// Builder for a [`SyncContext`].
///
/// Only writing runs need a database; everything else has a default.
#[derive(Default)]
pub struct SyncContextBuilder {
    options: Option<SyncOptions>,
    database: Option<Arc<DatabaseConnection>>,
    progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    persist_batch_size: Option<usize>,
    bus: Option<StatusBus>,
}

impl SyncContextBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run options (default: [`SyncOptions::default`]).
    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the database that receives rows and status changes.
    pub fn database(mut self, db: Arc<DatabaseConnection>) -> Self {
        self.database = Some(db);
        self
    }

    /// Set the callback that receives [`SyncEvent`](super::SyncEvent)s.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Flag raised by the ctrl-c handler; checked between page batches.
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Rows buffered by the persist task before a flush.
    pub fn persist_batch_size(mut self, size: usize) -> Self {
        self.persist_batch_size = Some(size);
        self
    }

    /// Publish status transitions on an existing bus instead of a new one.
    pub fn status_bus(mut self, bus: StatusBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Build the context.
    ///
    /// # Errors
    ///
    /// A run that writes needs a database.
    pub fn build(self) -> Result<SyncContext> {
        let options = self.options.unwrap_or_default();
        if !options.dry_run && self.database.is_none() {
            return Err(SyncContextError::MissingField { field: "database" });
        }

        // dry runs leave the stored status untouched
        let status_db = if options.dry_run {
            None
        } else {
            self.database.clone()
        };

        Ok(SyncContext {
            options,
            database: self.database,
            progress: self.progress,
            shutdown_flag: self.shutdown_flag,
            persist_batch_size: self.persist_batch_size.unwrap_or(PERSIST_BATCH_SIZE),
            tracker: ProgressTracker::new(),
            reconciler: StatusReconciler::new(status_db, self.bus.unwrap_or_default()),
        })
    }
}

/// Run-scoped state: options, storage, live progress and status.
pub struct SyncContext {
    options: SyncOptions,
    database: Option<Arc<DatabaseConnection>>,
    progress: Option<Arc<ProgressCallback>>,
    shutdown_flag: Option<Arc<AtomicBool>>,
    persist_batch_size: usize,
    tracker: ProgressTracker,
    reconciler: StatusReconciler,
}

impl SyncContext {
    /// Start building a context.
    pub fn builder() -> SyncContextBuilder {
        SyncContextBuilder::new()
    }

    /// Options this run was built with.
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Database connection, if any.
    pub fn database(&self) -> Option<&Arc<DatabaseConnection>> {
        self.database.as_ref()
    }

    /// Whether nothing is written.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Whether ctrl-c was pressed.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    pub(crate) fn shutdown_flag(&self) -> Option<Arc<AtomicBool>> {
        self.shutdown_flag.clone()
    }

    pub(crate) fn progress_handle(&self) -> Option<Arc<ProgressCallback>> {
        self.progress.clone()
    }

    pub(crate) fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_deref()
    }

    pub(crate) fn persist_batch_size(&self) -> usize {
        self.persist_batch_size
    }

    /// Live per-integration progress.
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Status reconciler shared by every integration in this run.
    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    /// Receive every status transition made during this run.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.reconciler.subscribe()
    }

    /// Fail integrations left `loading` by a run that died.
    pub async fn reconcile_stale(&self) -> std::result::Result<Vec<StatusTransition>, StatusError> {
        self.reconciler.reconcile_stale().await
    }

    /// Sync one integration. See [`engine::sync_integration`].
    pub async fn sync_integration<C: MarketplaceClient + 'static>(
        &self,
        client: Arc<C>,
        integration: &IntegrationModel,
    ) -> std::result::Result<SyncReport, SyncError> {
        engine::sync_integration(self, client, integration).await
    }

    /// Sync integrations one after another. See [`engine::sync_all`].
    pub async fn sync_all<C, F>(
        &self,
        integrations: Vec<IntegrationModel>,
        make_client: F,
    ) -> Vec<IntegrationSyncResult>
    where
        C: MarketplaceClient + 'static,
        F: Fn(&IntegrationModel) -> std::result::Result<C, PlatformError>,
    {
        engine::sync_all(self, integrations, make_client).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn writing_runs_need_a_database() {
        let err = SyncContext::builder()
            .build()
            .err()
            .expect("database is required");
        assert!(matches!(
            err,
            SyncContextError::MissingField { field: "database" }
        ));
    }

    #[test]
    fn dry_runs_work_without_a_database() {
        let ctx = SyncContext::builder()
            .options(SyncOptions {
                dry_run: true,
                ..SyncOptions::default()
            })
            .build()
            .expect("dry run builds");
        assert!(ctx.is_dry_run());
        assert!(ctx.database().is_none());
        assert_eq!(ctx.persist_batch_size(), PERSIST_BATCH_SIZE);
    }

    #[test]
    fn shutdown_flag_is_observed() {
        let flag = Arc::new(AtomicBool::new(false));
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let ctx = SyncContext::builder()
            .database(db)
            .shutdown_flag(Arc::clone(&flag))
            .persist_batch_size(50)
            .build()
            .expect("builds");

        assert!(!ctx.is_shutdown_requested());
        flag.store(true, Ordering::Relaxed);
        assert!(ctx.is_shutdown_requested());
        assert_eq!(ctx.persist_batch_size(), 50);
    }

    #[test]
    fn shared_bus_reaches_external_subscribers() {
        let bus = StatusBus::new(8);
        let _rx = bus.subscribe();
        let ctx = SyncContext::builder()
            .options(SyncOptions {
                dry_run: true,
                ..SyncOptions::default()
            })
            .status_bus(bus.clone())
            .build()
            .expect("builds");
        let _ctx_rx = ctx.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }
}
