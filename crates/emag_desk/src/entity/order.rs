//! Order entity - an order imported from the marketplace.
//!
//! Rows are append-only. `(integration_id, emag_id)` is unique and inserts
//! that hit it are skipped.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `type` value the API uses for orders fulfilled by eMAG.
pub const ORDER_TYPE_FBE: i32 = 2;
/// `type` value the API uses for orders fulfilled by the seller.
pub const ORDER_TYPE_FBM: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emag_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub integration_id: Uuid,
    /// Order id assigned by the marketplace.
    pub emag_id: i64,

    /// Marketplace status code (0 cancelled .. 5 returned).
    pub status: i32,
    /// Fulfilment type, see [`ORDER_TYPE_FBE`] and [`ORDER_TYPE_FBM`].
    pub order_type: Option<i32>,
    pub payment_mode_id: Option<i32>,
    pub customer_name: Option<String>,
    pub product_count: i32,
    /// Sum of line totals, decimal string.
    pub total: String,
    pub currency: Option<String>,

    /// Order date in marketplace-local time.
    pub ordered_at: DateTime,
    pub modified_at: Option<DateTime>,

    /// Raw order as returned by the API.
    #[sea_orm(column_type = "Json")]
    pub payload: Json,
    pub imported_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::integration::Entity",
        from = "Column::IntegrationId",
        to = "super::integration::Column::Id",
        on_delete = "Cascade"
    )]
    Integration,
}

impl Related<super::integration::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Integration.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_fulfilled_by_emag(&self) -> bool {
        self.order_type == Some(ORDER_TYPE_FBE)
    }
}
