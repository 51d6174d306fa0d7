//! Live per-integration progress for the current run.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::platform::Resource;
use crate::repository::InsertOutcome;

/// Fetched versus expected records for one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ResourceProgress {
    pub fetched: u64,
    pub total: u64,
}

impl ResourceProgress {
    /// `fetched / total * 100`, clamped to `0..=100`; `100` when nothing is
    /// expected.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.fetched.saturating_mul(100) / self.total;
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}

/// Progress of one integration within a run. Dropped with the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SyncProgress {
    pub orders: ResourceProgress,
    pub offers: ResourceProgress,
    pub inserted: u64,
    pub skipped: u64,
}

impl SyncProgress {
    pub fn resource(&self, resource: Resource) -> &ResourceProgress {
        match resource {
            Resource::Orders => &self.orders,
            Resource::ProductOffers => &self.offers,
        }
    }

    fn resource_mut(&mut self, resource: Resource) -> &mut ResourceProgress {
        match resource {
            Resource::Orders => &mut self.orders,
            Resource::ProductOffers => &mut self.offers,
        }
    }

    pub fn orders_percent(&self) -> u8 {
        self.orders.percent()
    }

    pub fn offers_percent(&self) -> u8 {
        self.offers.percent()
    }
}

/// Progress of every integration in the run, keyed by integration id.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    inner: Mutex<HashMap<Uuid, SyncProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(&self, id: Uuid, f: impl FnOnce(&mut SyncProgress) -> T) -> T {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(inner.entry(id).or_default())
    }

    /// Reset an integration's entry at the start of its run.
    pub fn start(&self, id: Uuid) {
        self.update(id, |p| *p = SyncProgress::default());
    }

    pub fn set_total(&self, id: Uuid, resource: Resource, total: u64) {
        self.update(id, |p| {
            let r = p.resource_mut(resource);
            r.total = total;
            r.fetched = 0;
        });
    }

    /// Add fetched records and return the resource's new percent.
    pub fn record_fetched(&self, id: Uuid, resource: Resource, count: u64) -> u8 {
        self.update(id, |p| {
            let r = p.resource_mut(resource);
            r.fetched = r.fetched.saturating_add(count);
            r.percent()
        })
    }

    pub fn record_outcome(&self, id: Uuid, outcome: InsertOutcome) {
        self.update(id, |p| {
            p.inserted += outcome.inserted;
            p.skipped += outcome.skipped;
        });
    }

    /// Add rows skipped before reaching the database.
    pub fn record_skipped(&self, id: Uuid, skipped: u64) {
        self.update(id, |p| p.skipped += skipped);
    }

    /// Mark a resource done so its percent reads 100 even when the API
    /// over-reported the count.
    pub fn complete(&self, id: Uuid, resource: Resource) {
        self.update(id, |p| {
            let r = p.resource_mut(resource);
            r.total = r.fetched;
        });
    }

    pub fn snapshot(&self, id: Uuid) -> Option<SyncProgress> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(&id).copied()
    }

    pub fn remove(&self, id: Uuid) -> Option<SyncProgress> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped() {
        let p = ResourceProgress {
            fetched: 150,
            total: 100,
        };
        assert_eq!(p.percent(), 100);

        let p = ResourceProgress {
            fetched: 1,
            total: 3,
        };
        assert_eq!(p.percent(), 33);
    }

    #[test]
    fn empty_resource_reads_complete() {
        assert_eq!(ResourceProgress::default().percent(), 100);
    }

    #[test]
    fn tracker_accumulates_per_integration() {
        let tracker = ProgressTracker::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        tracker.start(a);
        tracker.set_total(a, Resource::Orders, 200);
        assert_eq!(tracker.record_fetched(a, Resource::Orders, 100), 50);
        assert_eq!(tracker.record_fetched(a, Resource::Orders, 100), 100);
        tracker.record_outcome(
            a,
            InsertOutcome {
                inserted: 150,
                skipped: 50,
            },
        );
        tracker.record_skipped(a, 2);

        let snap = tracker.snapshot(a).expect("tracked");
        assert_eq!(snap.orders_percent(), 100);
        assert_eq!(snap.inserted, 150);
        assert_eq!(snap.skipped, 52);
        assert!(tracker.snapshot(b).is_none());
    }

    #[test]
    fn complete_forces_full_percent() {
        let tracker = ProgressTracker::new();
        let id = Uuid::new_v4();
        tracker.set_total(id, Resource::ProductOffers, 10);
        tracker.record_fetched(id, Resource::ProductOffers, 7);
        assert_eq!(tracker.snapshot(id).map(|s| s.offers_percent()), Some(70));

        tracker.complete(id, Resource::ProductOffers);
        assert_eq!(tracker.snapshot(id).map(|s| s.offers_percent()), Some(100));
    }

    #[test]
    fn start_resets_previous_run() {
        let tracker = ProgressTracker::new();
        let id = Uuid::new_v4();
        tracker.record_skipped(id, 5);
        tracker.start(id);
        assert_eq!(tracker.snapshot(id), Some(SyncProgress::default()));
        assert!(tracker.remove(id).is_some());
        assert!(tracker.snapshot(id).is_none());
    }
}
