//! Incremental date window for order imports.

use chrono::NaiveDateTime;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::platform::{ReadFilter, Resource};
use crate::repository::{self, RepositoryError};

use super::record::MarketplaceRecord;

/// Lower bound of the records a run still needs.
///
/// Starts at the newest `ordered_at` already stored. Records created exactly
/// at the start are kept and left for dedupe to absorb.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IncrementalWindow {
    start: Option<NaiveDateTime>,
}

impl IncrementalWindow {
    /// No lower bound: every record is wanted.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn starting_at(start: NaiveDateTime) -> Self {
        Self { start: Some(start) }
    }

    /// Window for the next run of `resource`.
    ///
    /// Unbounded for a full sync, for resources the API cannot filter by
    /// date, and when no database is attached.
    pub async fn load(
        db: Option<&DatabaseConnection>,
        integration_id: Uuid,
        resource: Resource,
        full: bool,
    ) -> Result<Self, RepositoryError> {
        let Some(db) = db else {
            return Ok(Self::unbounded());
        };
        if full || !resource.supports_date_filter() {
            return Ok(Self::unbounded());
        }

        let start = repository::latest_order_date(db, integration_id).await?;
        Ok(Self { start })
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.start
    }

    /// Server-side filter matching this window.
    pub fn filter(&self) -> ReadFilter {
        match self.start {
            Some(ts) => ReadFilter::created_after(ts),
            None => ReadFilter::default(),
        }
    }

    /// Records without a timestamp are always admitted.
    pub fn admits(&self, timestamp: Option<NaiveDateTime>) -> bool {
        match (self.start, timestamp) {
            (Some(start), Some(ts)) => ts >= start,
            _ => true,
        }
    }

    /// Drop records strictly older than the start; returns how many went.
    pub fn retain<R: MarketplaceRecord>(&self, records: &mut Vec<R>) -> usize {
        let before = records.len();
        records.retain(|r| self.admits(r.window_timestamp()));
        before - records.len()
    }
}
