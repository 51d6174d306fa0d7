//! Sync options, reports, errors and tuning constants.

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::integration::IntegrationError;
use crate::platform::{PlatformError, Resource};
use crate::repository::RepositoryError;

use super::status::StatusError;

/// Largest page the Marketplace API serves.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default records per page.
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// Default number of pages fetched concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Maximum backoff delay in milliseconds when rate limited.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum retries for one rate-limited request.
pub const MAX_RATE_LIMIT_RETRIES: u32 = 5;

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Ignore the incremental window and page through everything.
    pub full: bool,
    /// Fetch but never write.
    pub dry_run: bool,
    /// Records per page, clamped to `1..=MAX_PAGE_SIZE`.
    pub page_size: u32,
    /// Pages fetched concurrently per batch.
    pub batch_size: usize,
    /// Resources to sync, in order.
    pub resources: Vec<Resource>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            full: false,
            dry_run: false,
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            resources: vec![Resource::Orders, Resource::ProductOffers],
        }
    }
}

impl SyncOptions {
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn includes(&self, resource: Resource) -> bool {
        self.resources.contains(&resource)
    }
}

/// Pages to request for `total` records.
///
/// The API's own page count is only trusted when the computed count is zero
/// but the API still reports pages.
pub fn page_count(total: u64, page_size: u32, api_pages: u64) -> u32 {
    let page_size = u64::from(page_size.max(1));
    let computed = total.div_ceil(page_size);
    let pages = if computed == 0 { api_pages } else { computed };
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Outcome of syncing one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct KindReport {
    /// Records the API said match.
    pub reported: u64,
    /// Pages requested.
    pub pages: u32,
    /// Records received.
    pub fetched: u64,
    /// Records dropped for being older than the window start.
    pub filtered: u64,
    /// Records seen twice in one run and collapsed before insert.
    pub duplicates: u64,
    /// Rows written.
    pub inserted: u64,
    /// Rows not written: existing rows plus in-run duplicates.
    pub skipped: u64,
    /// Start of the incremental window used, if any.
    pub window_start: Option<NaiveDateTime>,
}

/// Outcome of syncing one integration.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncReport {
    pub integration_id: Uuid,
    pub integration: String,
    pub dry_run: bool,
    /// `None` when orders were not part of the run.
    pub orders: Option<KindReport>,
    /// `None` when offers were not part of the run.
    pub offers: Option<KindReport>,
}

impl SyncReport {
    pub fn new(integration_id: Uuid, integration: impl Into<String>, dry_run: bool) -> Self {
        Self {
            integration_id,
            integration: integration.into(),
            dry_run,
            orders: None,
            offers: None,
        }
    }

    pub fn set(&mut self, resource: Resource, report: KindReport) {
        match resource {
            Resource::Orders => self.orders = Some(report),
            Resource::ProductOffers => self.offers = Some(report),
        }
    }

    pub fn get(&self, resource: Resource) -> Option<&KindReport> {
        match resource {
            Resource::Orders => self.orders.as_ref(),
            Resource::ProductOffers => self.offers.as_ref(),
        }
    }

    pub fn total_inserted(&self) -> u64 {
        self.orders.iter().chain(self.offers.iter()).map(|r| r.inserted).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.orders.iter().chain(self.offers.iter()).map(|r| r.skipped).sum()
    }
}

/// Reasons a sync run fails.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Failed to persist {resource}: {message}")]
    Persist { resource: Resource, message: String },

    #[error("Sync task failed: {0}")]
    Task(String),

    #[error("interrupted")]
    Interrupted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_resources() {
        let options = SyncOptions::default();
        assert!(!options.full);
        assert!(!options.dry_run);
        assert_eq!(options.page_size, 100);
        assert_eq!(options.batch_size, 5);
        assert!(options.includes(Resource::Orders));
        assert!(options.includes(Resource::ProductOffers));
    }

    #[test]
    fn page_size_and_batch_size_are_clamped() {
        let options = SyncOptions {
            page_size: 500,
            batch_size: 0,
            ..SyncOptions::default()
        };
        assert_eq!(options.effective_page_size(), MAX_PAGE_SIZE);
        assert_eq!(options.effective_batch_size(), 1);

        let options = SyncOptions {
            page_size: 0,
            ..SyncOptions::default()
        };
        assert_eq!(options.effective_page_size(), 1);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 100, 0), 0);
        assert_eq!(page_count(1, 100, 1), 1);
        assert_eq!(page_count(100, 100, 1), 1);
        assert_eq!(page_count(101, 100, 2), 2);
        assert_eq!(page_count(250, 50, 3), 5);
    }

    #[test]
    fn page_count_falls_back_to_api_pages_only_when_total_is_zero() {
        assert_eq!(page_count(0, 100, 3), 3);
        assert_eq!(page_count(150, 100, 9), 2);
    }

    #[test]
    fn report_totals_sum_present_kinds() {
        let mut report = SyncReport::new(Uuid::new_v4(), "shop", false);
        report.set(
            Resource::Orders,
            KindReport {
                inserted: 4,
                skipped: 1,
                ..KindReport::default()
            },
        );
        assert_eq!(report.total_inserted(), 4);
        assert!(report.get(Resource::ProductOffers).is_none());

        report.set(
            Resource::ProductOffers,
            KindReport {
                inserted: 2,
                skipped: 3,
                ..KindReport::default()
            },
        );
        assert_eq!(report.total_inserted(), 6);
        assert_eq!(report.total_skipped(), 4);
    }

    #[test]
    fn interrupted_message() {
        assert_eq!(SyncError::Interrupted.to_string(), "interrupted");
    }
}
