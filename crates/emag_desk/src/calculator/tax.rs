//! Income tax regimes and VAT helpers.
//!
//! Romanian sellers are taxed either as micro-enterprises (a percent of
//! revenue, whatever the profit) or on profit (16%). Which one applies, and
//! at what rate, is the seller's situation, so both are parameters.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VAT_RATE_PERCENT: Decimal = dec!(21);
pub const DEFAULT_MICRO_RATE_PERCENT: Decimal = dec!(1);
pub const DEFAULT_PROFIT_RATE_PERCENT: Decimal = dec!(16);

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum IncomeTax {
    /// Tax on revenue (net of VAT).
    Micro { rate_percent: Decimal },
    /// Tax on positive profit; losses are not taxed.
    Profit { rate_percent: Decimal },
}

impl Default for IncomeTax {
    fn default() -> Self {
        IncomeTax::Micro {
            rate_percent: DEFAULT_MICRO_RATE_PERCENT,
        }
    }
}

impl IncomeTax {
    pub fn micro() -> Self {
        Self::default()
    }

    pub fn profit() -> Self {
        IncomeTax::Profit {
            rate_percent: DEFAULT_PROFIT_RATE_PERCENT,
        }
    }

    /// Build a regime from its configuration name.
    pub fn from_name(name: &str, micro_rate: Decimal, profit_rate: Decimal) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "micro" => Some(IncomeTax::Micro {
                rate_percent: micro_rate,
            }),
            "profit" => Some(IncomeTax::Profit {
                rate_percent: profit_rate,
            }),
            _ => None,
        }
    }

    pub fn rate_percent(&self) -> Decimal {
        match self {
            IncomeTax::Micro { rate_percent } | IncomeTax::Profit { rate_percent } => {
                *rate_percent
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IncomeTax::Micro { .. } => "micro",
            IncomeTax::Profit { .. } => "profit",
        }
    }

    /// Tax owed on one unit.
    pub fn tax_on(&self, revenue: Decimal, profit_before_tax: Decimal) -> Decimal {
        match self {
            IncomeTax::Micro { rate_percent } => revenue * percent(*rate_percent),
            IncomeTax::Profit { rate_percent } => {
                profit_before_tax.max(Decimal::ZERO) * percent(*rate_percent)
            }
        }
    }
}

impl std::fmt::Display for IncomeTax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}%", self.name(), self.rate_percent().normalize())
    }
}

/// `21` -> `0.21`.
pub fn percent(value: Decimal) -> Decimal {
    value / HUNDRED
}

/// Price without VAT, given a gross price.
pub fn net_of_vat(gross: Decimal, vat_rate_percent: Decimal) -> Decimal {
    let divisor = Decimal::ONE + percent(vat_rate_percent);
    gross.checked_div(divisor).unwrap_or(gross)
}

/// Round for display; intermediate values keep full precision.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp(2)
}
