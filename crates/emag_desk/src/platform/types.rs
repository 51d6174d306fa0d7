use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::sync::SyncEvent;

use super::errors::Result;

/// Callback receiving fine-grained sync events.
pub type ProgressCallback = Box<dyn Fn(SyncEvent) + Send + Sync>;

/// Marketplace resources the sync pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Orders,
    ProductOffers,
}

impl Resource {
    /// Path segment of the resource in the Marketplace API.
    pub fn api_path(self) -> &'static str {
        match self {
            Resource::Orders => "order",
            Resource::ProductOffers => "product_offer",
        }
    }

    /// Whether the API can filter this resource by creation date.
    pub fn supports_date_filter(self) -> bool {
        matches!(self, Resource::Orders)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::Orders => write!(f, "orders"),
            Resource::ProductOffers => write!(f, "offers"),
        }
    }
}

/// Answer of a `count` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCount {
    /// Records matching the filter.
    pub items: u64,
    /// Pages as computed by the API for its own page size.
    pub pages: u64,
}

/// Server-side filter for `count` and `read` calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadFilter {
    /// Only records created at or after this marketplace-local time.
    pub created_after: Option<NaiveDateTime>,
}

impl ReadFilter {
    pub fn created_after(ts: NaiveDateTime) -> Self {
        Self {
            created_after: Some(ts),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.created_after.is_none()
    }
}

/// An order as reported by the marketplace, independent of API shape.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformOrder {
    pub emag_id: i64,
    pub status: i32,
    pub order_type: Option<i32>,
    pub payment_mode_id: Option<i32>,
    pub customer_name: Option<String>,
    pub product_count: i32,
    pub total: Decimal,
    pub currency: Option<String>,
    pub ordered_at: NaiveDateTime,
    pub modified_at: Option<NaiveDateTime>,
    /// Untouched API record.
    pub raw: serde_json::Value,
}

/// A seller offer as reported by the marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformOffer {
    pub emag_id: i64,
    pub name: String,
    pub part_number: Option<String>,
    pub part_number_key: Option<String>,
    pub category_id: Option<i64>,
    pub brand: Option<String>,
    pub sale_price: Decimal,
    pub currency: Option<String>,
    pub stock: i64,
    pub status: i32,
    pub genius_eligible: bool,
    pub raw: serde_json::Value,
}

/// Read access to one seller account on the marketplace.
///
/// Implemented by the eMAG client; the sync engine only sees this trait.
#[async_trait]
pub trait MarketplaceClient: Send + Sync {
    /// Integration whose credentials this client uses.
    fn integration_id(&self) -> Uuid;

    /// Count records matching `filter`.
    async fn count(&self, resource: Resource, filter: &ReadFilter) -> Result<RecordCount>;

    /// Read one page of orders (pages start at 1).
    async fn read_orders(
        &self,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PlatformOrder>>;

    /// Read one page of offers (pages start at 1).
    async fn read_offers(
        &self,
        page: u32,
        items_per_page: u32,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PlatformOffer>>;
}
