//! Progress events emitted while a sync run pulls and stores records.
//!
//! Every event names the integration it belongs to so a single callback can
//! follow a multi-integration run.

use chrono::NaiveDateTime;
use uuid::Uuid;

pub use crate::platform::ProgressCallback;
use crate::platform::Resource;

/// Fine-grained events of a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncEvent {
    /// Asking the API how many records match.
    Counting {
        integration: String,
        resource: Resource,
    },

    /// Count known; paging is about to start.
    Counted {
        integration: String,
        resource: Resource,
        /// Records the API reported.
        total: u64,
        /// Pages that will be requested.
        pages: u32,
        /// Start of the incremental window, `None` for a full sync.
        window_start: Option<NaiveDateTime>,
    },

    /// One page came back.
    FetchedPage {
        integration: String,
        resource: Resource,
        /// Page number (1-indexed).
        page: u32,
        /// Records on this page.
        count: usize,
        /// Running total of records fetched for this resource.
        fetched_so_far: u64,
        /// Resource progress after this page, 0 to 100.
        percent: u8,
    },

    /// Every page of a batch arrived.
    BatchComplete {
        integration: String,
        resource: Resource,
        /// Batch number (1-indexed).
        batch: u32,
        /// Batches for this resource.
        batches: u32,
    },

    /// Records older than the window start were dropped.
    WindowFiltered {
        integration: String,
        resource: Resource,
        dropped: usize,
    },

    /// The persist task is writing a batch.
    PersistingBatch {
        resource: Resource,
        count: usize,
        final_batch: bool,
    },

    /// A batch was written.
    Persisted {
        resource: Resource,
        inserted: u64,
        skipped: u64,
    },

    /// A batch could not be written.
    PersistError {
        resource: Resource,
        count: usize,
        error: String,
    },

    /// Waiting out a rate limit before retrying a request.
    RateLimitBackoff {
        resource: Resource,
        page: u32,
        retry_after_ms: u64,
        attempt: u32,
    },

    /// Something worth surfacing that does not stop the run.
    Warning { message: String },

    /// A resource finished syncing for an integration.
    ResourceComplete {
        integration: String,
        resource: Resource,
        fetched: u64,
        inserted: u64,
        skipped: u64,
    },
}

/// Emit an event if a callback is present.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncEvent) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

/// Integration label used in events: the name when known, else the id.
pub(crate) fn integration_label(name: &str, id: Uuid) -> String {
    if name.is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}
