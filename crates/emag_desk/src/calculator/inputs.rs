//! Calculator inputs: one cost sheet per profile plus the shared tax setup.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};

use super::profile::{Profile, ProfileSet};
use super::tax::{DEFAULT_VAT_RATE_PERCENT, IncomeTax};
use super::{CalcError, Result};

/// Largest per-unit amount accepted; keeps projected totals well inside
/// `Decimal` range.
pub const MAX_AMOUNT: Decimal = dec!(1000000000);

/// Goods bought outside the EU and cleared through customs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCosts {
    /// Transport to the border, per unit.
    pub freight_per_unit: Decimal,
    pub customs_duty_percent: Decimal,
}

/// Everything that varies per profile. Money is per unit in the
/// storefront's currency.
///
/// Inside a [`CalculatorInput`], fields left out of a serialized sheet take
/// the value from [`ProfileInputs::defaults_for`] its profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInputs {
    /// Customer price, VAT included.
    pub sale_price: Decimal,
    /// Supplier price, VAT excluded.
    pub purchase_cost: Decimal,
    pub commission_percent: Decimal,
    pub shipping_cost: Decimal,
    pub fulfillment_fee: Decimal,
    pub storage_fee: Decimal,
    pub genius_fee_percent: Decimal,
    pub packaging_cost: Decimal,
    pub marketing_cost: Decimal,
    pub other_costs: Decimal,
    pub import: Option<ImportCosts>,
}

impl ProfileInputs {
    /// Starting sheet for `profile`; prices and purchase cost are left at zero.
    pub fn defaults_for(profile: Profile) -> Self {
        let base = ProfileInputs {
            commission_percent: dec!(15),
            packaging_cost: dec!(2),
            ..ProfileInputs::default()
        };
        match profile {
            Profile::FbmNonGenius => ProfileInputs {
                shipping_cost: dec!(15),
                ..base
            },
            Profile::FbmGenius => ProfileInputs {
                shipping_cost: dec!(15),
                genius_fee_percent: dec!(3),
                ..base
            },
            Profile::Fbe => ProfileInputs {
                fulfillment_fee: dec!(8),
                storage_fee: dec!(1),
                ..base
            },
        }
    }

    fn validate(&self, profile: Profile) -> Result<()> {
        let amounts = [
            ("sale_price", self.sale_price),
            ("purchase_cost", self.purchase_cost),
            ("shipping_cost", self.shipping_cost),
            ("fulfillment_fee", self.fulfillment_fee),
            ("storage_fee", self.storage_fee),
            ("packaging_cost", self.packaging_cost),
            ("marketing_cost", self.marketing_cost),
            ("other_costs", self.other_costs),
        ];
        for (field, value) in amounts {
            valid_amount(profile, field, value)?;
        }

        let mut percents = vec![
            ("commission_percent", self.commission_percent),
            ("genius_fee_percent", self.genius_fee_percent),
        ];
        if let Some(import) = &self.import {
            valid_amount(profile, "freight_per_unit", import.freight_per_unit)?;
            percents.push(("customs_duty_percent", import.customs_duty_percent));
        }
        for (field, value) in percents {
            valid_percent(Some(profile), field, value)?;
        }
        Ok(())
    }
}

/// Full calculator state: shared tax setup plus one sheet per profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculatorInput {
    #[serde(default = "default_vat_rate")]
    pub vat_rate_percent: Decimal,
    #[serde(default = "default_vat_payer")]
    pub vat_payer: bool,
    #[serde(default)]
    pub income_tax: IncomeTax,
    #[serde(default = "default_profiles", deserialize_with = "profiles_over_defaults")]
    pub profiles: ProfileSet<ProfileInputs>,
}

/// A profile sheet as stored; absent fields keep the profile default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SheetOverrides {
    sale_price: Option<Decimal>,
    purchase_cost: Option<Decimal>,
    commission_percent: Option<Decimal>,
    shipping_cost: Option<Decimal>,
    fulfillment_fee: Option<Decimal>,
    storage_fee: Option<Decimal>,
    genius_fee_percent: Option<Decimal>,
    packaging_cost: Option<Decimal>,
    marketing_cost: Option<Decimal>,
    other_costs: Option<Decimal>,
    import: Option<ImportCosts>,
}

impl SheetOverrides {
    fn over(self, defaults: ProfileInputs) -> ProfileInputs {
        ProfileInputs {
            sale_price: self.sale_price.unwrap_or(defaults.sale_price),
            purchase_cost: self.purchase_cost.unwrap_or(defaults.purchase_cost),
            commission_percent: self.commission_percent.unwrap_or(defaults.commission_percent),
            shipping_cost: self.shipping_cost.unwrap_or(defaults.shipping_cost),
            fulfillment_fee: self.fulfillment_fee.unwrap_or(defaults.fulfillment_fee),
            storage_fee: self.storage_fee.unwrap_or(defaults.storage_fee),
            genius_fee_percent: self.genius_fee_percent.unwrap_or(defaults.genius_fee_percent),
            packaging_cost: self.packaging_cost.unwrap_or(defaults.packaging_cost),
            marketing_cost: self.marketing_cost.unwrap_or(defaults.marketing_cost),
            other_costs: self.other_costs.unwrap_or(defaults.other_costs),
            import: self.import.or(defaults.import),
        }
    }
}

fn profiles_over_defaults<'de, D>(
    deserializer: D,
) -> std::result::Result<ProfileSet<ProfileInputs>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Default, Deserialize)]
    #[serde(default)]
    struct Sheets {
        fbm_non_genius: SheetOverrides,
        fbm_genius: SheetOverrides,
        fbe: SheetOverrides,
    }

    let sheets = Sheets::deserialize(deserializer)?;
    Ok(ProfileSet {
        fbm_non_genius: sheets
            .fbm_non_genius
            .over(ProfileInputs::defaults_for(Profile::FbmNonGenius)),
        fbm_genius: sheets
            .fbm_genius
            .over(ProfileInputs::defaults_for(Profile::FbmGenius)),
        fbe: sheets.fbe.over(ProfileInputs::defaults_for(Profile::Fbe)),
    })
}

fn default_vat_rate() -> Decimal {
    DEFAULT_VAT_RATE_PERCENT
}

fn default_vat_payer() -> bool {
    true
}

fn default_profiles() -> ProfileSet<ProfileInputs> {
    ProfileSet::from_fn(ProfileInputs::defaults_for)
}

impl Default for CalculatorInput {
    fn default() -> Self {
        Self {
            vat_rate_percent: default_vat_rate(),
            vat_payer: default_vat_payer(),
            income_tax: IncomeTax::default(),
            profiles: default_profiles(),
        }
    }
}

impl CalculatorInput {
    /// Same sale price and purchase cost on every profile.
    pub fn with_price(mut self, sale_price: Decimal, purchase_cost: Decimal) -> Self {
        for profile in Profile::ALL {
            let sheet = self.profiles.get_mut(profile);
            sheet.sale_price = sale_price;
            sheet.purchase_cost = purchase_cost;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        valid_percent(None, "vat_rate_percent", self.vat_rate_percent)?;
        valid_percent(None, "income_tax.rate_percent", self.income_tax.rate_percent())?;
        for (profile, sheet) in self.profiles.iter() {
            sheet.validate(profile)?;
        }
        Ok(())
    }
}

fn valid_amount(profile: Profile, field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO {
        return Err(CalcError::Negative {
            profile: Some(profile),
            field,
            value,
        });
    }
    if value > MAX_AMOUNT {
        return Err(CalcError::TooLarge {
            profile,
            field,
            value,
        });
    }
    Ok(())
}

fn valid_percent(profile: Option<Profile>, field: &'static str, value: Decimal) -> Result<()> {
    if value < Decimal::ZERO || value > dec!(100) {
        return Err(CalcError::PercentOutOfRange {
            profile,
            field,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_differ_per_profile() {
        let input = CalculatorInput::default();
        assert_eq!(input.profiles.fbe.shipping_cost, Decimal::ZERO);
        assert_eq!(input.profiles.fbe.fulfillment_fee, dec!(8));
        assert_eq!(input.profiles.fbm_genius.genius_fee_percent, dec!(3));
        assert_eq!(input.profiles.fbm_non_genius.genius_fee_percent, Decimal::ZERO);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let mut input = CalculatorInput::default().with_price(dec!(100), dec!(40));
        input.profiles.fbm_genius.shipping_cost = dec!(-1);
        let err = input.validate().expect_err("negative shipping");
        assert!(matches!(
            err,
            CalcError::Negative {
                profile: Some(Profile::FbmGenius),
                field: "shipping_cost",
                ..
            }
        ));
    }

    #[test]
    fn percents_above_hundred_are_rejected() {
        let mut input = CalculatorInput::default();
        input.profiles.fbe.commission_percent = dec!(100.5);
        assert!(matches!(
            input.validate(),
            Err(CalcError::PercentOutOfRange {
                field: "commission_percent",
                ..
            })
        ));

        let mut input = CalculatorInput::default();
        input.profiles.fbe.import = Some(ImportCosts {
            freight_per_unit: dec!(3),
            customs_duty_percent: dec!(-2),
        });
        assert!(input.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let input: CalculatorInput =
            serde_json::from_value(serde_json::json!({"vat_payer": false})).unwrap();
        assert!(!input.vat_payer);
        assert_eq!(input.vat_rate_percent, dec!(21));
        assert_eq!(input.profiles.fbm_genius.shipping_cost, dec!(15));
    }

    #[test]
    fn partial_sheets_keep_their_profile_defaults() {
        let input: CalculatorInput = serde_json::from_value(serde_json::json!({
            "profiles": {
                "fbe": { "sale_price": "149.99", "purchase_cost": "62" },
                "fbm_genius": { "genius_fee_percent": "4" }
            }
        }))
        .unwrap();

        assert_eq!(input.profiles.fbe.sale_price, dec!(149.99));
        assert_eq!(input.profiles.fbe.fulfillment_fee, dec!(8));
        assert_eq!(input.profiles.fbe.storage_fee, dec!(1));
        assert_eq!(input.profiles.fbm_genius.genius_fee_percent, dec!(4));
        assert_eq!(input.profiles.fbm_genius.shipping_cost, dec!(15));
        assert_eq!(
            input.profiles.fbm_non_genius,
            ProfileInputs::defaults_for(Profile::FbmNonGenius)
        );
    }

    #[test]
    fn saved_input_reads_back_unchanged() {
        let mut input = CalculatorInput::default().with_price(dec!(99.9), dec!(30));
        input.profiles.fbe.fulfillment_fee = Decimal::ZERO;
        let back: CalculatorInput =
            serde_json::from_value(serde_json::to_value(&input).unwrap()).unwrap();
        assert_eq!(back, input);
    }

    #[test]
    fn amounts_above_the_limit_are_rejected() {
        let mut input = CalculatorInput::default().with_price(dec!(100), dec!(40));
        input.profiles.fbm_non_genius.marketing_cost = MAX_AMOUNT + Decimal::ONE;
        assert!(matches!(
            input.validate(),
            Err(CalcError::TooLarge {
                profile: Profile::FbmNonGenius,
                field: "marketing_cost",
                ..
            })
        ));
    }
}
