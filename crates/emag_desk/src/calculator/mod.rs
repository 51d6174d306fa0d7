//! Profitability calculator.
//!
//! Evaluates one offer under the three fulfilment profiles side by side:
//!
//! - [`profile`] - `Profile` and the per-profile container `ProfileSet`
//! - [`inputs`] - `CalculatorInput` cost sheets and validation
//! - [`tax`] - VAT helpers and the `IncomeTax` regimes
//! - [`breakdown`] - per-unit `Breakdown` and `calculate()`
//! - [`estimator`] - unit allocation across profiles and projected totals
//!
//! ```ignore
//! use emag_desk::calculator::{CalculatorInput, calculate};
//!
//! let input = CalculatorInput::default().with_price(dec!(149.99), dec!(62));
//! let breakdowns = calculate(&input)?;
//! println!("FBE net profit: {}", breakdowns.fbe.net_profit);
//! ```

pub mod breakdown;
pub mod estimator;
pub mod inputs;
pub mod profile;
pub mod tax;

use rust_decimal::Decimal;
use thiserror::Error;

pub use breakdown::{Breakdown, calculate, calculate_profile, most_profitable};
pub use estimator::{EstimateReport, ProfileEstimate, SalesEstimate, allocate_units, estimate};
pub use inputs::{CalculatorInput, ImportCosts, MAX_AMOUNT, ProfileInputs};
pub use profile::{Profile, ProfileSet};
pub use tax::{
    DEFAULT_MICRO_RATE_PERCENT, DEFAULT_PROFIT_RATE_PERCENT, DEFAULT_VAT_RATE_PERCENT, IncomeTax,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalcError {
    #[error("{field}{} must not be negative, got {value}", scope(.profile))]
    Negative {
        profile: Option<Profile>,
        field: &'static str,
        value: Decimal,
    },

    #[error("{field}{} must be between 0 and 100, got {value}", scope(.profile))]
    PercentOutOfRange {
        profile: Option<Profile>,
        field: &'static str,
        value: Decimal,
    },

    #[error("{field} ({profile}) must not exceed {}, got {value}", inputs::MAX_AMOUNT)]
    TooLarge {
        profile: Profile,
        field: &'static str,
        value: Decimal,
    },

    #[error("profile shares must sum to 100, got {total}")]
    SharesDontSum { total: Decimal },

    #[error("{0} is too large to compute")]
    Overflow(&'static str),
}

fn scope(profile: &Option<Profile>) -> String {
    profile.map(|p| format!(" ({p})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, CalcError>;
