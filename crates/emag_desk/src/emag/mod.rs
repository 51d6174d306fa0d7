//! eMAG Marketplace API (v3) client.
//!
//! Every call is a JSON `POST` to `<region host>/api-3/<resource>/<action>`
//! with HTTP Basic credentials. Answers come wrapped in an envelope whose
//! `isError` flag can be set on an HTTP 200, so both layers are checked.

mod client;
mod convert;
mod error;
mod types;

pub use client::{DEFAULT_TIMEOUT_SECS, EmagClient, EmagClientOptions};
pub use convert::{
    EMAG_DATE_FORMAT, format_emag_date, parse_emag_date, to_platform_offer, to_platform_order,
};
pub use error::{EmagError, is_rate_limit_error, short_error_message};
pub use types::{
    CountResults, EmagCustomer, EmagOffer, EmagOrder, EmagOrderProduct, EmagWarehouseStock,
    Envelope,
};
