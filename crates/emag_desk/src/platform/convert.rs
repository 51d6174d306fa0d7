//! Conversions from marketplace records to database rows.

use chrono::Utc;
use sea_orm::Set;
use uuid::Uuid;

use crate::entity::{order, product_offer};

use super::types::{PlatformOffer, PlatformOrder};

impl PlatformOrder {
    pub fn to_active_model(&self, integration_id: Uuid) -> order::ActiveModel {
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(integration_id),
            emag_id: Set(self.emag_id),
            status: Set(self.status),
            order_type: Set(self.order_type),
            payment_mode_id: Set(self.payment_mode_id),
            customer_name: Set(self.customer_name.clone()),
            product_count: Set(self.product_count),
            total: Set(self.total.normalize().to_string()),
            currency: Set(self.currency.clone()),
            ordered_at: Set(self.ordered_at),
            modified_at: Set(self.modified_at),
            payload: Set(self.raw.clone()),
            imported_at: Set(Utc::now().fixed_offset()),
        }
    }
}

impl PlatformOffer {
    pub fn to_active_model(&self, integration_id: Uuid) -> product_offer::ActiveModel {
        product_offer::ActiveModel {
            id: Set(Uuid::new_v4()),
            integration_id: Set(integration_id),
            emag_id: Set(self.emag_id),
            name: Set(self.name.clone()),
            part_number: Set(self.part_number.clone()),
            part_number_key: Set(self.part_number_key.clone()),
            category_id: Set(self.category_id),
            brand: Set(self.brand.clone()),
            sale_price: Set(self.sale_price.normalize().to_string()),
            currency: Set(self.currency.clone()),
            stock: Set(self.stock),
            status: Set(self.status),
            genius_eligible: Set(self.genius_eligible),
            payload: Set(self.raw.clone()),
            imported_at: Set(Utc::now().fixed_offset()),
        }
    }
}
