//! Profitability calculator commands.
//!
//! `calc run` evaluates a selection under the three fulfilment profiles;
//! `save`, `list`, `show` and `remove` manage named calculations.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use emag_desk::calculator::{
    Breakdown, CalculatorInput, IncomeTax, Profile, ProfileSet, calculate, most_profitable,
};
use emag_desk::{Selection, integration, repository};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tabled::Tabled;
use uuid::Uuid;

use super::shared::{OutputFormat, confirm, print_json, print_table};
use crate::config::Config;

/// Where the calculator input comes from, plus quick overrides.
#[derive(Debug, Clone, clap::Args)]
pub struct InputArgs {
    /// emag:<integration>:<offer id>, saved:<name or id> or created:<n>
    #[arg(default_value = "created:1")]
    selection: String,

    /// JSON file with a full calculator input; replaces the selection's input
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Sale price, VAT included, for every profile
    #[arg(long)]
    price: Option<Decimal>,

    /// Purchase cost per unit for every profile
    #[arg(long)]
    cost: Option<Decimal>,

    /// Commission percent for every profile
    #[arg(long)]
    commission: Option<Decimal>,

    /// VAT rate percent
    #[arg(long)]
    vat_rate: Option<Decimal>,

    /// Treat the seller as not registered for VAT
    #[arg(long)]
    no_vat: bool,

    /// Income tax regime: micro or profit
    #[arg(long, value_name = "REGIME")]
    income_tax: Option<String>,
}

impl InputArgs {
    fn apply_overrides(&self, mut input: CalculatorInput, config: &Config) -> Result<CalculatorInput, String> {
        for profile in Profile::ALL {
            let sheet = input.profiles.get_mut(profile);
            if let Some(price) = self.price {
                sheet.sale_price = price;
            }
            if let Some(cost) = self.cost {
                sheet.purchase_cost = cost;
            }
            if let Some(commission) = self.commission {
                sheet.commission_percent = commission;
            }
        }
        if let Some(rate) = self.vat_rate {
            input.vat_rate_percent = rate;
        }
        if self.no_vat {
            input.vat_payer = false;
        }
        if let Some(name) = &self.income_tax {
            input.income_tax = IncomeTax::from_name(
                name,
                config.calculator.micro_rate_percent,
                config.calculator.profit_rate_percent,
            )
            .ok_or_else(|| format!("Unknown income tax regime '{}', use micro or profit", name))?;
        }
        Ok(input)
    }

    /// Resolve the selection, then layer the input file and flags on top.
    pub(crate) async fn load(
        &self,
        db: &DatabaseConnection,
        config: &Config,
    ) -> Result<(Selection, String, CalculatorInput), Box<dyn std::error::Error>> {
        let selection = parse_selection(db, &self.selection).await?;
        let resolved = selection.resolve(db, &config.calculator.defaults()).await?;

        let input = match &self.input {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => resolved.input,
        };
        let input = self.apply_overrides(input, config)?;
        input.validate()?;
        Ok((selection, resolved.label, input))
    }
}

/// Parse a selection, also accepting an integration name in `emag:` and a
/// calculation name in `saved:`.
pub(crate) async fn parse_selection(
    db: &DatabaseConnection,
    text: &str,
) -> Result<Selection, Box<dyn std::error::Error>> {
    let parse_err = match text.parse::<Selection>() {
        Ok(selection) => return Ok(selection),
        Err(e) => e,
    };

    let mut parts = text.trim().splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("emag"), Some(name), Some(offer)) => {
            let model = integration::resolve(db, name).await?;
            let offer_id = offer.parse::<i64>().map_err(|_| parse_err)?;
            Ok(Selection::EmagProduct {
                integration_id: model.id,
                offer_id,
            })
        }
        (Some("saved"), Some(name), None) => {
            let saved = repository::find_calculation_by_name(db, name)
                .await?
                .ok_or_else(|| format!("No saved calculation named '{}'", name))?;
            Ok(Selection::SavedCalculation { id: saved.id })
        }
        _ => Err(parse_err.into()),
    }
}

/// Calculator subcommands.
#[derive(Subcommand)]
pub enum CalcAction {
    /// Evaluate an offer under every profile
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Save the input of a calculation under a name (replacing any with that name)
    Save {
        /// Name to save under
        name: String,

        #[command(flatten)]
        input: InputArgs,
    },
    /// List saved calculations
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show a saved calculation with its results
    Show {
        /// Saved calculation name or id
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Remove a saved calculation
    Remove {
        /// Saved calculation name or id
        name: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

pub async fn handle_calc(
    action: CalcAction,
    config: &Config,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CalcAction::Run { input, output } => {
            let (selection, label, input) = input.load(db, config).await?;
            report(selection, &label, &input, output)?;
        }
        CalcAction::Save { name, input } => {
            let (_, _, input) = input.load(db, config).await?;
            // refuse to store something that cannot be evaluated
            calculate(&input)?;
            let saved = repository::save_calculation(db, &name, serde_json::to_value(&input)?).await?;
            println!(
                "{} Saved calculation '{}' (saved:{})",
                style("✓").green().bold(),
                style(&saved.name).cyan(),
                saved.id
            );
        }
        CalcAction::List { output } => list_saved(db, output).await?,
        CalcAction::Show { name, output } => {
            let id = find_saved(db, &name).await?;
            let selection = Selection::SavedCalculation { id };
            let resolved = selection.resolve(db, &config.calculator.defaults()).await?;
            report(selection, &resolved.label, &resolved.input, output)?;
        }
        CalcAction::Remove { name, yes } => {
            let id = find_saved(db, &name).await?;
            if !yes && !confirm(&format!("Remove saved calculation '{}'?", name))? {
                println!("Aborted.");
                return Ok(());
            }
            repository::delete_calculation(db, id).await?;
            println!(
                "{} Removed saved calculation '{}'",
                style("✓").green().bold(),
                style(&name).cyan()
            );
        }
    }
    Ok(())
}

async fn find_saved(db: &DatabaseConnection, key: &str) -> Result<Uuid, Box<dyn std::error::Error>> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(repository::find_calculation(db, id).await?.id);
    }
    repository::find_calculation_by_name(db, key)
        .await?
        .map(|saved| saved.id)
        .ok_or_else(|| format!("No saved calculation named '{}'", key).into())
}

#[derive(Debug, serde::Serialize, Tabled)]
struct SavedRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Selection")]
    selection: String,
}

async fn list_saved(
    db: &DatabaseConnection,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let saved = repository::list_calculations(db).await?;
    if saved.is_empty() && output == OutputFormat::Table {
        println!("No saved calculations.");
        return Ok(());
    }

    let rows: Vec<SavedRow> = saved
        .iter()
        .map(|model| {
            // the list stays readable even if one stored input is broken
            let price = serde_json::from_value::<CalculatorInput>(model.input.clone())
                .map(|input| input.profiles.fbm_non_genius.sale_price.to_string())
                .unwrap_or_else(|_| "?".to_string());
            SavedRow {
                name: model.name.clone(),
                price,
                updated: model.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                selection: Selection::SavedCalculation { id: model.id }.to_string(),
            }
        })
        .collect();

    match output {
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => print_json(&rows)?,
    }
    Ok(())
}

fn report(
    selection: Selection,
    label: &str,
    input: &CalculatorInput,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let breakdowns = calculate(input)?;
    let best = most_profitable(&breakdowns);

    match output {
        OutputFormat::Table => {
            println!(
                "{} ({}), VAT {}%{}, income tax {}",
                style(label).bold(),
                selection,
                input.vat_rate_percent.normalize(),
                if input.vat_payer { "" } else { " not registered" },
                input.income_tax
            );
            print_table(breakdown_rows(&breakdowns));
            println!(
                "{} Most profitable: {}",
                style("★").yellow().bold(),
                style(best).green().bold()
            );
        }
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct CalcJson<'a> {
                selection: Selection,
                label: &'a str,
                input: &'a CalculatorInput,
                breakdowns: &'a ProfileSet<Breakdown>,
                most_profitable: Profile,
            }
            print_json(&CalcJson {
                selection,
                label,
                input,
                breakdowns: &breakdowns,
                most_profitable: best,
            })?;
        }
    }
    Ok(())
}

/// One breakdown line across the three profiles.
#[derive(Debug, Tabled)]
struct BreakdownRow {
    #[tabled(rename = "")]
    item: &'static str,
    #[tabled(rename = "FBM-NonGenius")]
    fbm_non_genius: String,
    #[tabled(rename = "FBM-Genius")]
    fbm_genius: String,
    #[tabled(rename = "FBE")]
    fbe: String,
}

fn breakdown_rows(breakdowns: &ProfileSet<Breakdown>) -> Vec<BreakdownRow> {
    let money = |d: Decimal| d.to_string();
    let percent = |d: Option<Decimal>| d.map(|d| format!("{}%", d)).unwrap_or_else(|| "-".to_string());
    let price = |d: Option<Decimal>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());

    let line = |item: &'static str, cell: &dyn Fn(&Breakdown) -> String| {
        let cells = breakdowns.map(|_, b| cell(b));
        BreakdownRow {
            item,
            fbm_non_genius: cells.fbm_non_genius,
            fbm_genius: cells.fbm_genius,
            fbe: cells.fbe,
        }
    };

    vec![
        line("Sale price", &|b| money(b.sale_price)),
        line("Net price", &|b| money(b.net_price)),
        line("Output VAT", &|b| money(b.output_vat)),
        line("Commission", &|b| money(b.commission)),
        line("Genius fee", &|b| money(b.genius_fee)),
        line("Fulfilment fee", &|b| money(b.fulfillment_fee)),
        line("Storage fee", &|b| money(b.storage_fee)),
        line("VAT on services", &|b| money(b.service_vat)),
        line("Purchase cost", &|b| money(b.purchase_cost)),
        line("Freight", &|b| money(b.freight)),
        line("Customs duty", &|b| money(b.customs_duty)),
        line("VAT on goods", &|b| money(b.goods_vat)),
        line("Landed cost", &|b| money(b.landed_cost)),
        line("Marketplace fees", &|b| money(b.marketplace_fees)),
        line("Logistics", &|b| money(b.logistics_cost)),
        line("Other costs", &|b| money(b.other_costs)),
        line("Total costs", &|b| money(b.total_costs)),
        line("VAT to pay", &|b| money(b.vat_to_pay)),
        line("Profit before tax", &|b| money(b.profit_before_tax)),
        line("Income tax", &|b| money(b.income_tax)),
        line("Net profit", &|b| money(b.net_profit)),
        line("Margin", &|b| percent(b.margin_percent)),
        line("ROI", &|b| percent(b.roi_percent)),
        line("Break-even price", &|b| price(b.break_even_price)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rust_decimal_macros::dec;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        input: InputArgs,
    }

    fn args(argv: &[&str]) -> InputArgs {
        let mut full = vec!["calc"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).input
    }

    #[test]
    fn overrides_apply_to_every_profile() {
        let config = Config::default();
        let input = args(&["--price", "121", "--cost", "40", "--commission", "12", "--no-vat"])
            .apply_overrides(config.calculator.defaults(), &config)
            .unwrap();

        for (_, sheet) in input.profiles.iter() {
            assert_eq!(sheet.sale_price, dec!(121));
            assert_eq!(sheet.purchase_cost, dec!(40));
            assert_eq!(sheet.commission_percent, dec!(12));
        }
        assert!(!input.vat_payer);
    }

    #[test]
    fn income_tax_override_uses_configured_rates() {
        let config = Config::default();
        let input = args(&["--income-tax", "profit"])
            .apply_overrides(CalculatorInput::default(), &config)
            .unwrap();
        assert_eq!(input.income_tax, IncomeTax::profit());

        let err = args(&["--income-tax", "flat"])
            .apply_overrides(CalculatorInput::default(), &config)
            .unwrap_err();
        assert!(err.contains("flat"));
    }

    #[test]
    fn default_selection_is_a_scratch_calculation() {
        assert_eq!(args(&[]).selection, "created:1");
    }

    #[test]
    fn breakdown_table_has_a_row_per_figure() {
        let input = CalculatorInput::default().with_price(dec!(121), dec!(40));
        let rows = breakdown_rows(&calculate(&input).unwrap());
        let net = rows.iter().find(|r| r.item == "Net price").unwrap();
        assert_eq!(net.fbe.parse::<Decimal>().unwrap(), dec!(100));
        assert_eq!(rows.len(), 24);
    }
}
