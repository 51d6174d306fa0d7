use chrono::NaiveDateTime;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entity::order::{self, Entity as Order};
use crate::entity::product_offer::{self, Entity as ProductOffer};

use super::errors::{RepositoryError, Result};

/// Newest `ordered_at` stored for an integration; the start of the next
/// incremental order window.
pub async fn latest_order_date(
    db: &DatabaseConnection,
    integration_id: Uuid,
) -> Result<Option<NaiveDateTime>> {
    let newest = Order::find()
        .filter(order::Column::IntegrationId.eq(integration_id))
        .order_by_desc(order::Column::OrderedAt)
        .one(db)
        .await?;
    Ok(newest.map(|o| o.ordered_at))
}

pub async fn count_orders(db: &DatabaseConnection, integration_id: Uuid) -> Result<u64> {
    Ok(Order::find()
        .filter(order::Column::IntegrationId.eq(integration_id))
        .count(db)
        .await?)
}

pub async fn count_offers(db: &DatabaseConnection, integration_id: Uuid) -> Result<u64> {
    Ok(ProductOffer::find()
        .filter(product_offer::Column::IntegrationId.eq(integration_id))
        .count(db)
        .await?)
}

/// Most recent orders first.
pub async fn list_recent_orders(
    db: &DatabaseConnection,
    integration_id: Uuid,
    limit: u64,
) -> Result<Vec<order::Model>> {
    Ok(Order::find()
        .filter(order::Column::IntegrationId.eq(integration_id))
        .order_by_desc(order::Column::OrderedAt)
        .limit(limit)
        .all(db)
        .await?)
}

/// Offers ordered by name, optionally narrowed by a name or part-number
/// substring.
pub async fn list_offers(
    db: &DatabaseConnection,
    integration_id: Uuid,
    search: Option<&str>,
    limit: u64,
) -> Result<Vec<product_offer::Model>> {
    let mut query =
        ProductOffer::find().filter(product_offer::Column::IntegrationId.eq(integration_id));

    if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
        query = query.filter(
            product_offer::Column::Name
                .contains(term)
                .or(product_offer::Column::PartNumber.contains(term)),
        );
    }

    Ok(query
        .order_by_asc(product_offer::Column::Name)
        .limit(limit)
        .all(db)
        .await?)
}

pub async fn find_offer(
    db: &DatabaseConnection,
    integration_id: Uuid,
    emag_id: i64,
) -> Result<product_offer::Model> {
    ProductOffer::find()
        .filter(product_offer::Column::IntegrationId.eq(integration_id))
        .filter(product_offer::Column::EmagId.eq(emag_id))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found_by_emag_id(integration_id, emag_id))
}
