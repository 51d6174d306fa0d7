//! Common re-exports for convenient entity usage.

pub use super::integration::{
    ActiveModel as IntegrationActiveModel, Column as IntegrationColumn, Entity as Integration,
    Model as IntegrationModel,
};
pub use super::order::{
    ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as Order, Model as OrderModel,
};
pub use super::product_offer::{
    ActiveModel as ProductOfferActiveModel, Column as ProductOfferColumn, Entity as ProductOffer,
    Model as ProductOfferModel,
};
pub use super::region::Region;
pub use super::saved_calculation::{
    ActiveModel as SavedCalculationActiveModel, Column as SavedCalculationColumn,
    Entity as SavedCalculation, Model as SavedCalculationModel,
};
pub use super::sync_status::SyncStatus;
