//! Projected monthly sales across the fulfilment profiles.

use console::style;
use emag_desk::calculator::{EstimateReport, Profile, ProfileEstimate, ProfileSet, SalesEstimate, estimate};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use tabled::Tabled;

use super::calc::InputArgs;
use super::shared::{OutputFormat, print_json, print_table};
use crate::config::Config;

/// Flags of the `estimate` command.
#[derive(Debug, Clone, clap::Args)]
pub struct EstimateArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Units expected to sell in total
    #[arg(short, long, default_value_t = 100)]
    units: u32,

    /// Percent sold through FBM-NonGenius, FBM-Genius and FBE
    #[arg(short, long, value_delimiter = ',', default_values_t = [
        Decimal::from(40), Decimal::from(30), Decimal::from(30)
    ])]
    shares: Vec<Decimal>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

impl EstimateArgs {
    fn sales(&self) -> Result<SalesEstimate, String> {
        let [non_genius, genius, fbe] = self.shares[..] else {
            return Err(format!(
                "--shares takes three percentages, got {}",
                self.shares.len()
            ));
        };
        Ok(SalesEstimate {
            total_units: self.units,
            shares: ProfileSet {
                fbm_non_genius: non_genius,
                fbm_genius: genius,
                fbe,
            },
        })
    }
}

#[derive(Debug, Tabled)]
struct EstimateRow {
    #[tabled(rename = "Profile")]
    profile: String,
    #[tabled(rename = "Units")]
    units: u32,
    #[tabled(rename = "Share")]
    share: String,
    #[tabled(rename = "Revenue")]
    revenue: Decimal,
    #[tabled(rename = "Net revenue")]
    net_revenue: Decimal,
    #[tabled(rename = "VAT to pay")]
    vat_to_pay: Decimal,
    #[tabled(rename = "Income tax")]
    income_tax: Decimal,
    #[tabled(rename = "Net profit")]
    net_profit: Decimal,
}

impl EstimateRow {
    fn new(profile: impl Into<String>, e: &ProfileEstimate) -> Self {
        Self {
            profile: profile.into(),
            units: e.units,
            share: format!("{}%", e.share_percent.normalize()),
            revenue: e.revenue,
            net_revenue: e.net_revenue,
            vat_to_pay: e.vat_to_pay,
            income_tax: e.income_tax,
            net_profit: e.net_profit,
        }
    }
}

fn estimate_rows(report: &EstimateReport) -> Vec<EstimateRow> {
    let mut rows: Vec<EstimateRow> = Profile::ALL
        .into_iter()
        .map(|profile| EstimateRow::new(profile.label(), report.profiles.get(profile)))
        .collect();
    rows.push(EstimateRow::new("Total", &report.totals));
    rows
}

pub async fn handle_estimate(
    args: EstimateArgs,
    config: &Config,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let (selection, label, input) = args.input.load(db, config).await?;
    let sales = args.sales()?;
    let report = estimate(&input, &sales)?;

    match args.output {
        OutputFormat::Table => {
            println!(
                "{} ({}), {} units",
                style(&label).bold(),
                selection,
                sales.total_units
            );
            print_table(estimate_rows(&report));
        }
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct EstimateJson<'a> {
                selection: emag_desk::Selection,
                label: &'a str,
                sales: &'a SalesEstimate,
                #[serde(flatten)]
                report: &'a EstimateReport,
            }
            print_json(&EstimateJson {
                selection,
                label: &label,
                sales: &sales,
                report: &report,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use emag_desk::calculator::CalculatorInput;
    use rust_decimal_macros::dec;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: EstimateArgs,
    }

    fn parse(argv: &[&str]) -> EstimateArgs {
        let mut full = vec!["estimate"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[test]
    fn default_split_is_forty_thirty_thirty() {
        let sales = parse(&[]).sales().unwrap();
        assert_eq!(sales.total_units, 100);
        assert_eq!(sales.shares.fbm_non_genius, dec!(40));
        assert_eq!(sales.shares.fbe, dec!(30));
    }

    #[test]
    fn shares_parse_from_a_comma_list() {
        let sales = parse(&["--units", "7", "--shares", "50,25.5,24.5"])
            .sales()
            .unwrap();
        assert_eq!(sales.total_units, 7);
        assert_eq!(sales.shares.fbm_genius, dec!(25.5));
    }

    #[test]
    fn wrong_share_count_is_rejected() {
        let err = parse(&["--shares", "50,50"]).sales().unwrap_err();
        assert!(err.contains("got 2"));
    }

    #[test]
    fn rows_end_with_totals() {
        let input = CalculatorInput::default().with_price(dec!(121), dec!(40));
        let report = estimate(&input, &SalesEstimate::default()).unwrap();
        let rows = estimate_rows(&report);

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].profile, "Total");
        assert_eq!(rows[3].units, 100);
        assert_eq!(rows[3].share, "100%");
    }
}
