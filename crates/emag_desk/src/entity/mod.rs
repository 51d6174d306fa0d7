//! SeaORM entity definitions for the emag_desk database schema.

pub mod integration;
pub mod order;
pub mod prelude;
pub mod product_offer;
pub mod region;
pub mod saved_calculation;
pub mod sync_status;
