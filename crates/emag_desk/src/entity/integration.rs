//! Integration entity - one seller account on one eMAG storefront.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::region::Region;
use crate::entity::sync_status::SyncStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// User-facing label, unique across integrations.
    #[sea_orm(unique)]
    pub name: String,

    /// Storefront the credentials belong to.
    pub region: Region,

    // ─── Credentials ─────────────────────────────────────────────────────────
    /// Marketplace API username.
    pub username: String,
    /// Marketplace API password.
    #[serde(skip_serializing)]
    pub password: String,

    // ─── Import Statistics ───────────────────────────────────────────────────
    /// Orders stored for this integration.
    pub orders_count: i64,
    /// Product offers stored for this integration.
    pub offers_count: i64,
    /// When orders were last imported successfully.
    pub last_orders_import: Option<DateTimeWithTimeZone>,
    /// When offers were last imported successfully.
    pub last_offers_import: Option<DateTimeWithTimeZone>,

    // ─── Sync Status ─────────────────────────────────────────────────────────
    pub sync_status: SyncStatus,
    /// Message of the run that ended in `error`, cleared on the next start.
    #[sea_orm(column_type = "Text")]
    pub last_error: Option<String>,
    pub status_updated_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::product_offer::Entity")]
    ProductOffers,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::product_offer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductOffers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Marketplace API base URL for this integration's storefront.
    pub fn api_url(&self) -> &'static str {
        self.region.api_base_url()
    }

    /// Username with all but the first two characters masked, for display.
    pub fn masked_username(&self) -> String {
        let visible: String = self.username.chars().take(2).collect();
        let hidden = self.username.chars().count().saturating_sub(2);
        format!("{}{}", visible, "*".repeat(hidden))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn model(username: &str) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            name: "main-ro".to_string(),
            region: Region::Ro,
            username: username.to_string(),
            password: "secret".to_string(),
            orders_count: 0,
            offers_count: 0,
            last_orders_import: None,
            last_offers_import: None,
            sync_status: SyncStatus::Idle,
            last_error: None,
            status_updated_at: now,
            created_at: now,
        }
    }

    #[test]
    fn test_masked_username() {
        assert_eq!(model("seller@shop.ro").masked_username(), "se************");
        assert_eq!(model("a").masked_username(), "a");
    }

    #[test]
    fn test_password_not_serialized() {
        let json = serde_json::to_value(model("seller")).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["region"], "ro");
    }

    #[test]
    fn test_api_url_follows_region() {
        let mut m = model("seller");
        m.region = Region::Hu;
        assert_eq!(m.api_url(), "https://marketplace-api.emag.hu/api-3");
    }
}
