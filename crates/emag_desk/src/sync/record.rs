//! Records the sync engine knows how to page, filter and store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::entity::{order, product_offer};
use crate::platform::{
    MarketplaceClient, PlatformOffer, PlatformOrder, ProgressCallback, ReadFilter, Resource,
    Result,
};
use crate::repository::ImportRow;

/// One marketplace record type: how to read a page of it and how to turn it
/// into a database row.
#[async_trait]
pub trait MarketplaceRecord: Clone + Send + Sync + 'static {
    /// Row written for each record.
    type Row: ImportRow;

    const RESOURCE: Resource;

    fn emag_id(&self) -> i64;

    /// Timestamp compared against the incremental window.
    fn window_timestamp(&self) -> Option<NaiveDateTime>;

    fn to_row(&self, integration_id: Uuid) -> Self::Row;

    async fn fetch_page<C>(
        client: &C,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Self>>
    where
        C: MarketplaceClient + ?Sized;
}

#[async_trait]
impl MarketplaceRecord for PlatformOrder {
    type Row = order::ActiveModel;

    const RESOURCE: Resource = Resource::Orders;

    fn emag_id(&self) -> i64 {
        self.emag_id
    }

    fn window_timestamp(&self) -> Option<NaiveDateTime> {
        Some(self.ordered_at)
    }

    fn to_row(&self, integration_id: Uuid) -> order::ActiveModel {
        self.to_active_model(integration_id)
    }

    async fn fetch_page<C>(
        client: &C,
        page: u32,
        items_per_page: u32,
        filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Self>>
    where
        C: MarketplaceClient + ?Sized,
    {
        client
            .read_orders(page, items_per_page, filter, on_progress)
            .await
    }
}

#[async_trait]
impl MarketplaceRecord for PlatformOffer {
    type Row = product_offer::ActiveModel;

    const RESOURCE: Resource = Resource::ProductOffers;

    fn emag_id(&self) -> i64 {
        self.emag_id
    }

    fn window_timestamp(&self) -> Option<NaiveDateTime> {
        None
    }

    fn to_row(&self, integration_id: Uuid) -> product_offer::ActiveModel {
        self.to_active_model(integration_id)
    }

    async fn fetch_page<C>(
        client: &C,
        page: u32,
        items_per_page: u32,
        _filter: &ReadFilter,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<Self>>
    where
        C: MarketplaceClient + ?Sized,
    {
        client.read_offers(page, items_per_page, on_progress).await
    }
}
