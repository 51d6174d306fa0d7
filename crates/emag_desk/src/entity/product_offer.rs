//! ProductOffer entity - a seller offer imported from the marketplace.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "emag_product_offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub integration_id: Uuid,
    /// Seller-side offer id as known to the marketplace.
    pub emag_id: i64,

    pub name: String,
    /// Seller SKU.
    pub part_number: Option<String>,
    /// Marketplace product key.
    pub part_number_key: Option<String>,
    pub category_id: Option<i64>,
    pub brand: Option<String>,

    /// Gross sale price, decimal string.
    pub sale_price: String,
    pub currency: Option<String>,
    /// Stock summed over warehouses.
    pub stock: i64,
    /// 1 active, 0 inactive.
    pub status: i32,
    pub genius_eligible: bool,

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
    /// Sale price parsed as a decimal, `None` if the stored text is malformed.
    pub fn sale_price_decimal(&self) -> Option<rust_decimal::Decimal> {
        self.sale_price.trim().parse().ok()
    }
}
