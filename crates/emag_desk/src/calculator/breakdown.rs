//! Per-unit profit breakdown for one profile.
//!
//! Figures are computed at full precision and rounded to cents only in the
//! returned [`Breakdown`].

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::inputs::CalculatorInput;
use super::profile::{Profile, ProfileSet};
use super::tax::{IncomeTax, net_of_vat, percent};
use super::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub profile: Profile,

    // Revenue
    pub sale_price: Decimal,
    pub net_price: Decimal,
    pub output_vat: Decimal,

    // Marketplace services, invoiced by eMAG with VAT
    pub commission: Decimal,
    pub genius_fee: Decimal,
    pub fulfillment_fee: Decimal,
    pub storage_fee: Decimal,
    pub service_vat: Decimal,

    // Goods
    pub purchase_cost: Decimal,
    pub freight: Decimal,
    pub customs_value: Decimal,
    pub customs_duty: Decimal,
    /// VAT on the goods: at customs for imports, to the supplier otherwise.
    pub goods_vat: Decimal,

    // Cost groups; input VAT lands here only for non-payers
    pub landed_cost: Decimal,
    pub marketplace_fees: Decimal,
    pub logistics_cost: Decimal,
    pub other_costs: Decimal,
    pub total_costs: Decimal,

    /// Negative when the state owes the seller.
    pub vat_to_pay: Decimal,
    pub profit_before_tax: Decimal,
    pub income_tax: Decimal,
    pub net_profit: Decimal,
    pub margin_percent: Option<Decimal>,
    pub roi_percent: Option<Decimal>,
    /// Gross price at which net profit is zero; `None` when fees grow as
    /// fast as the price does.
    pub break_even_price: Option<Decimal>,
}

/// Validate `input` and compute every profile.
pub fn calculate(input: &CalculatorInput) -> Result<ProfileSet<Breakdown>> {
    input.validate()?;
    Ok(ProfileSet::from_fn(|profile| compute(input, profile).rounded()))
}

/// Breakdown for a single profile.
pub fn calculate_profile(input: &CalculatorInput, profile: Profile) -> Result<Breakdown> {
    input.validate()?;
    Ok(compute(input, profile).rounded())
}

/// Profile with the highest net profit, first in [`Profile::ALL`] order on ties.
pub fn most_profitable(breakdowns: &ProfileSet<Breakdown>) -> Profile {
    let mut best = Profile::FbmNonGenius;
    for (profile, b) in breakdowns.iter() {
        if b.net_profit > breakdowns.get(best).net_profit {
            best = profile;
        }
    }
    best
}

/// Unrounded breakdown; `input` must already be valid.
pub(crate) fn compute(input: &CalculatorInput, profile: Profile) -> Breakdown {
    let sheet = input.profiles.get(profile);
    let vat = percent(input.vat_rate_percent);
    let price = sheet.sale_price;

    let net_price = if input.vat_payer {
        net_of_vat(price, input.vat_rate_percent)
    } else {
        price
    };
    let output_vat = price - net_price;

    let commission = price * percent(sheet.commission_percent);
    let genius_fee = price * percent(sheet.genius_fee_percent);
    let services = commission + genius_fee + sheet.fulfillment_fee + sheet.storage_fee;
    let service_vat = services * vat;

    let (freight, customs_duty_percent) = sheet
        .import
        .map(|i| (i.freight_per_unit, i.customs_duty_percent))
        .unwrap_or_default();
    let customs_value = sheet.purchase_cost + freight;
    let customs_duty = customs_value * percent(customs_duty_percent);
    let goods_vat = (customs_value + customs_duty) * vat;

    let (vat_to_pay, landed_cost, marketplace_fees) = if input.vat_payer {
        (
            output_vat - goods_vat - service_vat,
            customs_value + customs_duty,
            services,
        )
    } else {
        (
            Decimal::ZERO,
            customs_value + customs_duty + goods_vat,
            services + service_vat,
        )
    };
    let logistics_cost = sheet.shipping_cost + sheet.packaging_cost;
    let other_costs = sheet.marketing_cost + sheet.other_costs;
    let total_costs = landed_cost + marketplace_fees + logistics_cost + other_costs;

    let profit_before_tax = net_price - total_costs;
    let income_tax = input.income_tax.tax_on(net_price, profit_before_tax);
    let net_profit = profit_before_tax - income_tax;

    let price_linked = commission + genius_fee;
    let price_linked = if input.vat_payer {
        price_linked
    } else {
        price_linked + price_linked * vat
    };
    let break_even_price = break_even(
        input,
        total_costs - price_linked,
        percent(sheet.commission_percent + sheet.genius_fee_percent),
    );

    Breakdown {
        profile,
        sale_price: price,
        net_price,
        output_vat,
        commission,
        genius_fee,
        fulfillment_fee: sheet.fulfillment_fee,
        storage_fee: sheet.storage_fee,
        service_vat,
        purchase_cost: sheet.purchase_cost,
        freight,
        customs_value,
        customs_duty,
        goods_vat,
        landed_cost,
        marketplace_fees,
        logistics_cost,
        other_costs,
        total_costs,
        vat_to_pay,
        profit_before_tax,
        income_tax,
        net_profit,
        margin_percent: ratio_percent(net_profit, net_price),
        roi_percent: ratio_percent(net_profit, landed_cost),
        break_even_price,
    }
}

/// Solve `net_profit(P) = 0` for the gross price `P`.
///
/// `fixed` is every cost that does not scale with the price; `fee_rate` is
/// the commission plus Genius fee as a fraction of the gross price.
fn break_even(input: &CalculatorInput, fixed: Decimal, fee_rate: Decimal) -> Option<Decimal> {
    let vat_factor = Decimal::ONE + percent(input.vat_rate_percent);
    let kept = match input.income_tax {
        IncomeTax::Micro { rate_percent } => Decimal::ONE - percent(rate_percent),
        IncomeTax::Profit { .. } => Decimal::ONE,
    };
    let denominator = kept - fee_rate * vat_factor;
    if denominator <= Decimal::ZERO {
        return None;
    }
    let numerator = if input.vat_payer {
        fixed * vat_factor
    } else {
        fixed
    };
    numerator.checked_div(denominator)
}

fn ratio_percent(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    if denominator.is_zero() {
        return None;
    }
    numerator
        .checked_div(denominator)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
}

pub(crate) fn cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Breakdown {
    pub(crate) fn rounded(self) -> Self {
        Self {
            profile: self.profile,
            sale_price: cents(self.sale_price),
            net_price: cents(self.net_price),
            output_vat: cents(self.output_vat),
            commission: cents(self.commission),
            genius_fee: cents(self.genius_fee),
            fulfillment_fee: cents(self.fulfillment_fee),
            storage_fee: cents(self.storage_fee),
            service_vat: cents(self.service_vat),
            purchase_cost: cents(self.purchase_cost),
            freight: cents(self.freight),
            customs_value: cents(self.customs_value),
            customs_duty: cents(self.customs_duty),
            goods_vat: cents(self.goods_vat),
            landed_cost: cents(self.landed_cost),
            marketplace_fees: cents(self.marketplace_fees),
            logistics_cost: cents(self.logistics_cost),
            other_costs: cents(self.other_costs),
            total_costs: cents(self.total_costs),
            vat_to_pay: cents(self.vat_to_pay),
            profit_before_tax: cents(self.profit_before_tax),
            income_tax: cents(self.income_tax),
            net_profit: cents(self.net_profit),
            margin_percent: self.margin_percent.map(cents),
            roi_percent: self.roi_percent.map(cents),
            break_even_price: self.break_even_price.map(cents),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{CalcError, ImportCosts, MAX_AMOUNT};
    use rust_decimal_macros::dec;

    fn vat_payer() -> CalculatorInput {
        CalculatorInput::default().with_price(dec!(121), dec!(40))
    }

    #[test]
    fn vat_payer_non_genius() {
        let b = calculate_profile(&vat_payer(), Profile::FbmNonGenius).unwrap();

        assert_eq!(b.net_price, dec!(100.00));
        assert_eq!(b.output_vat, dec!(21.00));
        assert_eq!(b.commission, dec!(18.15));
        assert_eq!(b.service_vat, dec!(3.81));
        assert_eq!(b.goods_vat, dec!(8.40));
        assert_eq!(b.vat_to_pay, dec!(8.79));
        assert_eq!(b.landed_cost, dec!(40.00));
        assert_eq!(b.total_costs, dec!(75.15));
        assert_eq!(b.profit_before_tax, dec!(24.85));
        assert_eq!(b.income_tax, dec!(1.00));
        assert_eq!(b.net_profit, dec!(23.85));
        assert_eq!(b.margin_percent, Some(dec!(23.85)));
        assert_eq!(b.roi_percent, Some(dec!(59.63)));
        assert_eq!(b.break_even_price, Some(dec!(85.31)));
    }

    #[test]
    fn genius_fee_is_charged_on_the_gross_price() {
        let b = calculate_profile(&vat_payer(), Profile::FbmGenius).unwrap();
        assert_eq!(b.genius_fee, dec!(3.63));
        assert_eq!(b.marketplace_fees, dec!(21.78));
    }

    #[test]
    fn non_payer_carries_input_vat_as_cost() {
        let mut input = CalculatorInput::default().with_price(dec!(100), dec!(40));
        input.vat_payer = false;
        input.income_tax = IncomeTax::profit();
        let fbe = input.profiles.get_mut(Profile::Fbe);
        fbe.commission_percent = dec!(10);
        fbe.packaging_cost = Decimal::ZERO;

        let b = calculate_profile(&input, Profile::Fbe).unwrap();

        assert_eq!(b.net_price, dec!(100));
        assert_eq!(b.output_vat, Decimal::ZERO);
        assert_eq!(b.vat_to_pay, Decimal::ZERO);
        assert_eq!(b.landed_cost, dec!(48.40));
        assert_eq!(b.marketplace_fees, dec!(22.99));
        assert_eq!(b.total_costs, dec!(71.39));
        assert_eq!(b.income_tax, dec!(4.58));
        assert_eq!(b.net_profit, dec!(24.03));
        assert_eq!(b.roi_percent, Some(dec!(49.65)));
        assert_eq!(b.break_even_price, Some(dec!(67.45)));
    }

    #[test]
    fn imported_goods_pay_duty_and_vat_at_customs() {
        let mut input = vat_payer();
        input.profiles.fbe.import = Some(ImportCosts {
            freight_per_unit: dec!(5),
            customs_duty_percent: dec!(10),
        });

        let b = calculate_profile(&input, Profile::Fbe).unwrap();
        assert_eq!(b.customs_value, dec!(45));
        assert_eq!(b.customs_duty, dec!(4.50));
        assert_eq!(b.goods_vat, dec!(10.40));
        assert_eq!(b.landed_cost, dec!(49.50));
    }

    #[test]
    fn vat_refund_shows_as_negative() {
        let input = CalculatorInput::default().with_price(dec!(12.10), dec!(40));
        let b = calculate_profile(&input, Profile::FbmNonGenius).unwrap();
        assert!(b.vat_to_pay < Decimal::ZERO);
        assert!(b.net_profit < Decimal::ZERO);
    }

    #[test]
    fn losses_are_not_taxed_under_profit_regime() {
        let mut input = CalculatorInput::default().with_price(dec!(50), dec!(60));
        input.income_tax = IncomeTax::profit();
        let b = calculate_profile(&input, Profile::Fbe).unwrap();
        assert!(b.profit_before_tax < Decimal::ZERO);
        assert_eq!(b.income_tax, Decimal::ZERO);
        assert_eq!(b.net_profit, b.profit_before_tax);
    }

    #[test]
    fn zero_price_has_no_margin() {
        let b = calculate_profile(&CalculatorInput::default(), Profile::Fbe).unwrap();
        assert_eq!(b.margin_percent, None);
        assert_eq!(b.roi_percent, None);
    }

    #[test]
    fn full_commission_has_no_break_even() {
        let mut input = vat_payer();
        input.profiles.fbm_non_genius.commission_percent = dec!(100);
        let b = calculate_profile(&input, Profile::FbmNonGenius).unwrap();
        assert_eq!(b.break_even_price, None);
    }

    #[test]
    fn invalid_input_is_rejected_before_computing() {
        let mut input = vat_payer();
        input.vat_rate_percent = dec!(120);
        assert!(matches!(
            calculate(&input),
            Err(CalcError::PercentOutOfRange { .. })
        ));
    }

    #[test]
    fn amounts_beyond_the_limit_are_rejected() {
        let input = CalculatorInput::default().with_price(Decimal::MAX, Decimal::MAX);
        assert!(matches!(
            calculate(&input),
            Err(CalcError::TooLarge {
                field: "sale_price",
                ..
            })
        ));
    }

    #[test]
    fn largest_allowed_amounts_compute() {
        let mut input = CalculatorInput::default().with_price(MAX_AMOUNT, MAX_AMOUNT);
        for profile in Profile::ALL {
            let sheet = input.profiles.get_mut(profile);
            sheet.shipping_cost = MAX_AMOUNT;
            sheet.other_costs = MAX_AMOUNT;
        }
        let all = calculate(&input).unwrap();
        assert!(all.fbe.net_profit < Decimal::ZERO);
    }

    #[test]
    fn tiny_denominators_leave_ratios_empty() {
        let mut input = vat_payer();
        input.profiles.fbe.sale_price = MAX_AMOUNT;
        input.profiles.fbe.purchase_cost = dec!(0.0000000000000000000001);
        input.profiles.fbe.packaging_cost = Decimal::ZERO;
        let b = calculate_profile(&input, Profile::Fbe).unwrap();
        assert_eq!(b.roi_percent, None);
        assert!(b.margin_percent.is_some());
    }

    #[test]
    fn most_profitable_picks_highest_net_profit() {
        let input = vat_payer();
        let all = calculate(&input).unwrap();
        // 9 in fulfilment fees beats 15 in shipping.
        assert_eq!(most_profitable(&all), Profile::Fbe);
    }
}
