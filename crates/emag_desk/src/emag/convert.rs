//! API records to marketplace-agnostic records.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::platform::{PlatformOffer, PlatformOrder};

use super::error::EmagError;
use super::types::{EmagOffer, EmagOrder};

/// Date format used by the API for both filters and records.
pub const EMAG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_emag_date(value: &str) -> Result<NaiveDateTime, EmagError> {
    NaiveDateTime::parse_from_str(value.trim(), EMAG_DATE_FORMAT)
        .map_err(|e| EmagError::Decode(format!("bad date {value:?}: {e}")))
}

pub fn format_emag_date(value: NaiveDateTime) -> String {
    value.format(EMAG_DATE_FORMAT).to_string()
}

/// Parse one `order/read` item, keeping the raw JSON alongside.
pub fn to_platform_order(raw: serde_json::Value) -> Result<PlatformOrder, EmagError> {
    let order: EmagOrder = serde_json::from_value(raw.clone())?;
    let ordered_at = parse_emag_date(&order.date)?;
    let modified_at = order
        .modified
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(parse_emag_date)
        .transpose()?;

    let live: Vec<_> = order.products.iter().filter(|p| !p.is_removed()).collect();
    let total: Decimal = live
        .iter()
        .map(|p| p.sale_price.unwrap_or_default() * Decimal::from(p.units()))
        .sum();
    let units: i64 = live.iter().map(|p| p.units()).sum();
    let currency = order.products.iter().find_map(|p| p.currency.clone());
    let customer_name = order
        .customer
        .as_ref()
        .and_then(|c| c.name.clone().or_else(|| c.company.clone()));

    Ok(PlatformOrder {
        emag_id: order.id,
        status: order.status.unwrap_or_default(),
        order_type: order.order_type,
        payment_mode_id: order.payment_mode_id,
        customer_name,
        product_count: i32::try_from(units).unwrap_or(i32::MAX),
        total,
        currency,
        ordered_at,
        modified_at,
        raw,
    })
}

/// Parse one `product_offer/read` item. Stock is `general_stock` when sent,
/// else the sum over warehouses.
pub fn to_platform_offer(raw: serde_json::Value) -> Result<PlatformOffer, EmagError> {
    let offer: EmagOffer = serde_json::from_value(raw.clone())?;
    let stock = offer
        .general_stock
        .unwrap_or_else(|| offer.stock.iter().filter_map(|s| s.value).sum());

    Ok(PlatformOffer {
        emag_id: offer.id,
        name: offer.name.unwrap_or_default(),
        part_number: offer.part_number,
        part_number_key: offer.part_number_key,
        category_id: offer.category_id,
        brand: offer.brand,
        sale_price: offer.sale_price.unwrap_or_default(),
        currency: offer.currency,
        stock,
        status: offer.status.unwrap_or_default(),
        genius_eligible: offer.genius_eligibility == Some(1),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn dates_round_trip_the_api_format() {
        let ts = parse_emag_date("2025-03-01 10:15:00").expect("valid");
        assert_eq!(
            ts,
            NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        );
        assert_eq!(format_emag_date(ts), "2025-03-01 10:15:00");
        assert!(parse_emag_date("01.03.2025").is_err());
    }

    #[test]
    fn order_total_skips_removed_lines() {
        let order = to_platform_order(json!({
            "id": 900,
            "status": 4,
            "type": 2,
            "date": "2025-03-01 10:15:00",
            "modified": "",
            "customer": {"name": null, "company": "SC Exemplu SRL"},
            "products": [
                {"quantity": 2, "sale_price": "49.99", "currency": "RON", "status": 1},
                {"quantity": 1, "sale_price": "100", "status": 0},
                {"sale_price": "5.01", "status": 1}
            ]
        }))
        .expect("valid order");

        assert_eq!(order.total, dec!(104.99));
        assert_eq!(order.product_count, 3);
        assert_eq!(order.currency.as_deref(), Some("RON"));
        assert_eq!(order.customer_name.as_deref(), Some("SC Exemplu SRL"));
        assert_eq!(order.order_type, Some(2));
        assert!(order.modified_at.is_none());
        assert_eq!(order.raw["id"], 900);
    }

    #[test]
    fn order_with_bad_date_is_a_decode_error() {
        let err = to_platform_order(json!({"id": 1, "date": "yesterday"}))
            .expect_err("bad date");
        assert!(matches!(err, EmagError::Decode(_)));
    }

    #[test]
    fn offer_stock_prefers_general_stock() {
        let offer = to_platform_offer(json!({
            "id": 5,
            "name": "Husa telefon",
            "sale_price": "29.90",
            "general_stock": 12,
            "stock": [{"value": 3}],
            "status": 1
        }))
        .expect("valid offer");
        assert_eq!(offer.stock, 12);
        assert_eq!(offer.sale_price, dec!(29.90));
        assert!(!offer.genius_eligible);

        let summed = to_platform_offer(json!({
            "id": 6,
            "stock": [{"value": 3}, {"value": "4"}],
            "genius_eligibility": 1
        }))
        .expect("valid offer");
        assert_eq!(summed.stock, 7);
        assert!(summed.genius_eligible);
        assert_eq!(summed.name, "");
    }
}
