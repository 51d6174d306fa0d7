//! Wire types of the Marketplace API (v3).
//!
//! The API is loose about numbers: ids, counts and flags arrive as JSON
//! numbers or as strings depending on the endpoint, so they go through the
//! [`lenient`] helpers.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Envelope wrapping every response.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    pub results: Option<T>,
}

impl<T> Envelope<T> {
    /// Messages joined with `"; "`. Object messages are rendered as JSON.
    pub fn joined_messages(&self) -> String {
        self.messages
            .iter()
            .map(|m| match m {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Results of `<resource>/count`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountResults {
    #[serde(rename = "noOfItems", deserialize_with = "lenient::u64")]
    pub no_of_items: u64,
    #[serde(rename = "noOfPages", default, deserialize_with = "lenient::u64")]
    pub no_of_pages: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmagCustomer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmagOrderProduct {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub product_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    /// `0` marks a line removed from the order.
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub status: Option<i32>,
}

impl EmagOrderProduct {
    pub fn is_removed(&self) -> bool {
        self.status == Some(0)
    }

    /// Missing quantities count as one unit.
    pub fn units(&self) -> i64 {
        self.quantity.unwrap_or(1).max(0)
    }
}

/// Item of `order/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmagOrder {
    #[serde(deserialize_with = "lenient::i64")]
    pub id: i64,
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub status: Option<i32>,
    /// `2` fulfilled by eMAG, `3` fulfilled by the seller.
    #[serde(rename = "type", default, deserialize_with = "lenient::opt_i32")]
    pub order_type: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub payment_mode_id: Option<i32>,
    /// `YYYY-MM-DD HH:MM:SS`, marketplace-local time.
    pub date: String,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub customer: Option<EmagCustomer>,
    #[serde(default)]
    pub products: Vec<EmagOrderProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmagWarehouseStock {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub value: Option<i64>,
}

/// Item of `product_offer/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct EmagOffer {
    #[serde(deserialize_with = "lenient::i64")]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub part_number_key: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub status: Option<i32>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub general_stock: Option<i64>,
    #[serde(default)]
    pub stock: Vec<EmagWarehouseStock>,
    #[serde(default, deserialize_with = "lenient::opt_i32")]
    pub genius_eligibility: Option<i32>,
}

/// Deserializers accepting numbers, numeric strings and (for options) nulls
/// or empty strings.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Int(i64),
        Float(f64),
        Text(String),
    }

    fn to_i64(value: Loose) -> Result<Option<i64>, String> {
        match value {
            Loose::Int(n) => Ok(Some(n)),
            Loose::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Some(f as i64)),
            Loose::Float(f) => Err(format!("expected an integer, got {f}")),
            Loose::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<i64>()
                    .map(Some)
                    .map_err(|_| format!("expected an integer, got {s:?}"))
            }
        }
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        match Option::<Loose>::deserialize(d)? {
            Some(v) => to_i64(v).map_err(D::Error::custom),
            None => Ok(None),
        }
    }

    pub fn i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        opt_i64(d)?.ok_or_else(|| D::Error::custom("missing integer"))
    }

    pub fn opt_i32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        opt_i64(d)?
            .map(|n| i32::try_from(n).map_err(D::Error::custom))
            .transpose()
    }

    pub fn u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let n = opt_i64(d)?.unwrap_or(0);
        u64::try_from(n).map_err(D::Error::custom)
    }
}
