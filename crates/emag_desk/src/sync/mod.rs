//! Order and offer import from the marketplace.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `SyncReport`, `SyncError`, paging constants
//! - [`progress`] - `SyncEvent` stream and `emit()`
//! - [`tracker`] - per-integration `SyncProgress` for the current run
//! - [`status`] - status transitions and their broadcast bus
//! - [`window`] - incremental date window
//! - [`context`] - run-scoped `SyncContext`
//! - [`engine`] - `sync_integration()` and `sync_all()`
//!
//! ```ignore
//! use emag_desk::sync::{SyncContext, SyncOptions};
//!
//! let ctx = SyncContext::builder().database(db).build()?;
//! let report = ctx.sync_integration(Arc::new(client), &integration).await?;
//! println!("{} new orders", report.orders.map_or(0, |o| o.inserted));
//! ```

pub mod context;
pub mod engine;
pub mod persist_task;
mod progress;
mod record;
pub mod status;
pub mod tracker;
mod types;
pub mod window;

pub use context::{SyncContext, SyncContextBuilder, SyncContextError};
pub use engine::{IntegrationSyncResult, sync_all, sync_integration};
pub use persist_task::{PersistTaskResult, await_persist_task, spawn_persist_task};
pub use progress::{ProgressCallback, SyncEvent, emit};
pub use record::MarketplaceRecord;
pub use status::{
    INTERRUPTED_MESSAGE, StatusBus, StatusError, StatusReconciler, StatusTransition,
};
pub use tracker::{ProgressTracker, ResourceProgress, SyncProgress};
pub use types::{KindReport, SyncError, SyncOptions, SyncReport, page_count};
pub use window::IncrementalWindow;

pub use types::{
    DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_PAGE_SIZE,
    MAX_RATE_LIMIT_RETRIES,
};
