//! Marketplace-agnostic client trait and the types that cross it.
//!
//! The sync engine depends only on [`MarketplaceClient`]; the eMAG client in
//! [`crate::emag`] implements it over HTTP.

mod convert;
mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, ResourceLimiters, default_rps_for_resource, rate_limits};
pub use types::{
    MarketplaceClient, PlatformOffer, PlatformOrder, ProgressCallback, ReadFilter, RecordCount,
    Resource,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_display() {
        assert!(PlatformError::api("bad filter").to_string().contains("bad filter"));
        assert!(
            PlatformError::not_found("order 5")
                .to_string()
                .contains("Not found")
        );
        assert!(
            PlatformError::network("connection reset")
                .to_string()
                .contains("Network error")
        );
        assert_eq!(
            PlatformError::AuthRequired.to_string(),
            "Authentication failed"
        );
    }

    #[test]
    fn test_only_rate_limits_are_retryable() {
        assert!(
            PlatformError::RateLimited {
                retry_after_secs: Some(2)
            }
            .is_rate_limited()
        );
        assert!(!PlatformError::AuthRequired.is_rate_limited());
        assert!(!PlatformError::decode("eof").is_rate_limited());
    }

    #[test]
    fn test_short_error_message_takes_first_line() {
        let err = PlatformError::api("first line\nsecond line");
        assert_eq!(short_error_message(&err), "API error: first line");
    }

    #[test]
    fn test_resource_paths() {
        assert_eq!(Resource::Orders.api_path(), "order");
        assert_eq!(Resource::ProductOffers.api_path(), "product_offer");
        assert!(Resource::Orders.supports_date_filter());
        assert!(!Resource::ProductOffers.supports_date_filter());
    }

    #[test]
    fn test_read_filter_empty() {
        assert!(ReadFilter::default().is_empty());
        let ts = chrono::NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(!ReadFilter::created_after(ts).is_empty());
    }
}
