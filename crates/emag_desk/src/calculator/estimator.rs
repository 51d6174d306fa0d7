//! Sales estimator: spread projected unit sales over the three profiles.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::breakdown::{Breakdown, cents, compute};
use super::inputs::CalculatorInput;
use super::profile::{Profile, ProfileSet};
use super::{CalcError, Result};

/// Projected monthly volume and the percent of it sold through each profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesEstimate {
    pub total_units: u32,
    pub shares: ProfileSet<Decimal>,
}

impl Default for SalesEstimate {
    fn default() -> Self {
        Self {
            total_units: 100,
            shares: ProfileSet {
                fbm_non_genius: dec!(40),
                fbm_genius: dec!(30),
                fbe: dec!(30),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEstimate {
    pub units: u32,
    pub share_percent: Decimal,
    /// Gross, VAT included.
    pub revenue: Decimal,
    pub net_revenue: Decimal,
    pub vat_to_pay: Decimal,
    pub income_tax: Decimal,
    pub net_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub profiles: ProfileSet<ProfileEstimate>,
    pub totals: ProfileEstimate,
}

/// Split `total_units` by `shares` with the largest-remainder method.
///
/// Every profile gets the floor of its exact quota; units left over go to
/// the largest fractional parts, earlier profiles first on ties. The result
/// always sums to `total_units`.
pub fn allocate_units(total_units: u32, shares: &ProfileSet<Decimal>) -> Result<ProfileSet<u32>> {
    let mut sum = Decimal::ZERO;
    for (profile, share) in shares.iter() {
        if *share < Decimal::ZERO || *share > dec!(100) {
            return Err(CalcError::PercentOutOfRange {
                profile: Some(profile),
                field: "share",
                value: *share,
            });
        }
        sum += *share;
    }
    if sum != dec!(100) {
        return Err(CalcError::SharesDontSum { total: sum });
    }

    let total = Decimal::from(total_units);
    let quotas = shares.map(|_, share| total * share / dec!(100));
    let mut units = quotas.map(|_, q| q.floor().to_u32().unwrap_or(0));

    let assigned: u32 = units.iter().map(|(_, u)| *u).sum();
    let mut left = total_units.saturating_sub(assigned);

    let mut by_remainder: Vec<(Profile, Decimal)> = quotas
        .iter()
        .map(|(profile, q)| (profile, *q - q.floor()))
        .collect();
    // Stable sort keeps profile order on equal remainders.
    by_remainder.sort_by(|a, b| b.1.cmp(&a.1));

    for (profile, _) in by_remainder {
        if left == 0 {
            break;
        }
        *units.get_mut(profile) += 1;
        left -= 1;
    }
    Ok(units)
}

/// Project totals for `sales` from the per-unit breakdowns of `input`.
///
/// Products and totals are taken at full precision and rounded to cents
/// once, so volume does not multiply per-unit rounding.
pub fn estimate(input: &CalculatorInput, sales: &SalesEstimate) -> Result<EstimateReport> {
    input.validate()?;
    let units = allocate_units(sales.total_units, &sales.shares)?;

    let exact = units.try_map(|profile, n| {
        project(&compute(input, profile), *n, *sales.shares.get(profile))
    })?;

    let mut totals = ProfileEstimate {
        share_percent: dec!(100),
        ..ProfileEstimate::default()
    };
    for (_, p) in exact.iter() {
        totals = totals.plus(p)?;
    }

    Ok(EstimateReport {
        profiles: exact.map(|_, p| p.rounded()),
        totals: totals.rounded(),
    })
}

fn project(b: &Breakdown, units: u32, share_percent: Decimal) -> Result<ProfileEstimate> {
    let n = Decimal::from(units);
    let times = |field: &'static str, value: Decimal| {
        value.checked_mul(n).ok_or(CalcError::Overflow(field))
    };
    Ok(ProfileEstimate {
        units,
        share_percent,
        revenue: times("revenue", b.sale_price)?,
        net_revenue: times("net_revenue", b.net_price)?,
        vat_to_pay: times("vat_to_pay", b.vat_to_pay)?,
        income_tax: times("income_tax", b.income_tax)?,
        net_profit: times("net_profit", b.net_profit)?,
    })
}

impl ProfileEstimate {
    fn plus(self, other: &ProfileEstimate) -> Result<Self> {
        let add = |field: &'static str, a: Decimal, b: Decimal| {
            a.checked_add(b).ok_or(CalcError::Overflow(field))
        };
        Ok(ProfileEstimate {
            units: self.units.saturating_add(other.units),
            share_percent: self.share_percent,
            revenue: add("revenue", self.revenue, other.revenue)?,
            net_revenue: add("net_revenue", self.net_revenue, other.net_revenue)?,
            vat_to_pay: add("vat_to_pay", self.vat_to_pay, other.vat_to_pay)?,
            income_tax: add("income_tax", self.income_tax, other.income_tax)?,
            net_profit: add("net_profit", self.net_profit, other.net_profit)?,
        })
    }

    fn rounded(&self) -> Self {
        ProfileEstimate {
            units: self.units,
            share_percent: self.share_percent,
            revenue: cents(self.revenue),
            net_revenue: cents(self.net_revenue),
            vat_to_pay: cents(self.vat_to_pay),
            income_tax: cents(self.income_tax),
            net_profit: cents(self.net_profit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::MAX_AMOUNT;

    fn shares(a: Decimal, b: Decimal, c: Decimal) -> ProfileSet<Decimal> {
        ProfileSet {
            fbm_non_genius: a,
            fbm_genius: b,
            fbe: c,
        }
    }

    #[test]
    fn largest_remainder_sums_to_total() {
        let units = allocate_units(7, &shares(dec!(50), dec!(25), dec!(25))).unwrap();
        assert_eq!((units.fbm_non_genius, units.fbm_genius, units.fbe), (3, 2, 2));

        let units = allocate_units(10, &shares(dec!(33.33), dec!(33.33), dec!(33.34))).unwrap();
        assert_eq!((units.fbm_non_genius, units.fbm_genius, units.fbe), (3, 3, 4));
    }

    #[test]
    fn ties_favour_earlier_profiles() {
        let units = allocate_units(3, &shares(dec!(50), dec!(50), dec!(0))).unwrap();
        assert_eq!((units.fbm_non_genius, units.fbm_genius, units.fbe), (2, 1, 0));

        let units = allocate_units(1, &shares(dec!(0), dec!(50), dec!(50))).unwrap();
        assert_eq!((units.fbm_non_genius, units.fbm_genius, units.fbe), (0, 1, 0));
    }

    #[test]
    fn shares_must_sum_to_hundred() {
        let err = allocate_units(10, &shares(dec!(50), dec!(30), dec!(10))).unwrap_err();
        assert!(matches!(err, CalcError::SharesDontSum { total } if total == dec!(90)));

        let err = allocate_units(10, &shares(dec!(120), dec!(-10), dec!(-10))).unwrap_err();
        assert!(matches!(err, CalcError::PercentOutOfRange { .. }));
    }

    #[test]
    fn zero_units_is_all_zero() {
        let units = allocate_units(0, &SalesEstimate::default().shares).unwrap();
        assert_eq!(units, ProfileSet::default());
    }

    #[test]
    fn estimate_multiplies_per_unit_figures() {
        let input = CalculatorInput::default().with_price(dec!(121), dec!(40));
        let report = estimate(
            &input,
            &SalesEstimate {
                total_units: 10,
                shares: shares(dec!(100), dec!(0), dec!(0)),
            },
        )
        .unwrap();

        let fbm = &report.profiles.fbm_non_genius;
        assert_eq!(fbm.units, 10);
        assert_eq!(fbm.revenue, dec!(1210));
        assert_eq!(fbm.net_revenue, dec!(1000));
        assert_eq!(fbm.net_profit, dec!(238.50));
        assert_eq!(report.profiles.fbe.units, 0);
        assert_eq!(report.totals.units, 10);
        assert_eq!(report.totals.net_profit, fbm.net_profit);
    }

    #[test]
    fn volume_does_not_multiply_rounding() {
        let input = CalculatorInput::default().with_price(dec!(100.03), dec!(40.003));
        let report = estimate(
            &input,
            &SalesEstimate {
                total_units: 100_000,
                shares: shares(dec!(100), dec!(0), dec!(0)),
            },
        )
        .unwrap();

        // 9.835227... per unit, which shows as 9.84
        assert_eq!(report.profiles.fbm_non_genius.net_profit, dec!(983522.73));
        assert_eq!(report.totals.net_profit, dec!(983522.73));
    }

    #[test]
    fn oversized_inputs_are_errors() {
        let input =
            CalculatorInput::default().with_price(dec!(100000000000000000000), dec!(1));
        let sales = SalesEstimate {
            total_units: u32::MAX,
            ..SalesEstimate::default()
        };
        assert!(matches!(
            estimate(&input, &sales),
            Err(CalcError::TooLarge { .. })
        ));

        let input = CalculatorInput::default().with_price(MAX_AMOUNT, MAX_AMOUNT);
        let report = estimate(&input, &sales).unwrap();
        assert_eq!(report.totals.units, u32::MAX);
    }
}
