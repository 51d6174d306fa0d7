//! Storage for imported orders and offers, and for saved calculations.
//!
//! Imported rows are append-only: [`insert_deduped`] skips rows whose
//! `(integration_id, emag_id)` already exists and reports how many were
//! inserted versus skipped.

mod bulk;
mod errors;
mod query;
mod saved;

pub use bulk::{
    DEFAULT_INSERT_BACKOFF_MS, DEFAULT_INSERT_RETRIES, DedupeKey, ImportRow, InsertOutcome,
    insert_deduped, insert_deduped_with_retry,
};
pub use errors::{RepositoryError, Result};
pub use query::{
    count_offers, count_orders, find_offer, latest_order_date, list_offers, list_recent_orders,
};
pub use saved::{
    delete_calculation, find_calculation, find_calculation_by_name, list_calculations,
    save_calculation,
};
