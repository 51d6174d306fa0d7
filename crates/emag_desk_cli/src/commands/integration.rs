//! Integration management commands.
//!
//! Commands for managing seller accounts (add, list, show, remove).

use clap::Subcommand;
use console::style;
use emag_desk::emag::EmagClient;
use emag_desk::integration::{self, NewIntegration};
use emag_desk::{IntegrationModel, Region, repository};
use sea_orm::DatabaseConnection;
use tabled::Tabled;

use super::shared::{Detail, OutputFormat, confirm, plural, print_json, print_table};
use crate::config::Config;

/// Integration management subcommands.
#[derive(Subcommand)]
pub enum IntegrationAction {
    /// Register a seller account
    Add {
        /// Unique name for the account (e.g., "shop-ro")
        name: String,

        /// Storefront: ro, bg or hu
        #[arg(short, long, default_value = "ro")]
        region: Region,

        /// Marketplace API username
        #[arg(short, long)]
        username: String,

        /// Marketplace API password
        #[arg(short, long)]
        password: String,

        /// Check the credentials against the API before saving
        #[arg(long)]
        verify: bool,
    },
    /// List all integrations
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show details of an integration
    Show {
        /// Integration name or id
        name: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Remove an integration
    ///
    /// Warning: This also removes every order and offer stored for it.
    Remove {
        /// Integration name or id
        name: String,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Display struct for integration listing.
#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct IntegrationDisplay {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Orders")]
    orders: i64,
    #[tabled(rename = "Offers")]
    offers: i64,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&IntegrationModel> for IntegrationDisplay {
    fn from(model: &IntegrationModel) -> Self {
        Self {
            name: model.name.clone(),
            region: model.region.to_string(),
            username: model.masked_username(),
            orders: model.orders_count,
            offers: model.offers_count,
            status: format!("{:?}", model.sync_status).to_lowercase(),
        }
    }
}

/// Handle integration management commands.
pub async fn handle_integration(
    action: IntegrationAction,
    config: &Config,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        IntegrationAction::Add {
            name,
            region,
            username,
            password,
            verify,
        } => {
            let new = NewIntegration {
                name,
                region,
                username,
                password,
            };
            add_integration(db, new, verify, config).await?;
        }
        IntegrationAction::List { output } => list_integrations(db, output).await?,
        IntegrationAction::Show { name, output } => show_integration(db, &name, output).await?,
        IntegrationAction::Remove { name, yes } => remove_integration(db, &name, yes).await?,
    }
    Ok(())
}

async fn add_integration(
    db: &DatabaseConnection,
    new: NewIntegration,
    verify: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = integration::create(db, new).await?;

    if verify {
        let client = EmagClient::new(&model, &config.client_options())?;
        if let Err(e) = client.verify_credentials().await {
            // an account that cannot log in is not worth keeping
            integration::delete(db, model.id).await?;
            return Err(format!("Credentials rejected for '{}': {}", model.name, e).into());
        }
    }

    println!(
        "{} Added integration '{}' ({} @ {})",
        style("✓").green().bold(),
        style(&model.name).cyan(),
        model.masked_username(),
        model.region
    );
    Ok(())
}

async fn list_integrations(
    db: &DatabaseConnection,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let integrations = integration::list(db).await?;

    if integrations.is_empty() && output == OutputFormat::Table {
        println!("No integrations configured.");
        println!();
        println!("Add one with:");
        println!("  emag-desk integration add shop-ro --region ro -u <user> -p <password>");
        return Ok(());
    }

    let displays: Vec<IntegrationDisplay> =
        integrations.iter().map(IntegrationDisplay::from).collect();
    match output {
        OutputFormat::Table => print_table(displays),
        OutputFormat::Json => print_json(&displays)?,
    }
    Ok(())
}

async fn show_integration(
    db: &DatabaseConnection,
    name: &str,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = integration::resolve(db, name).await?;

    match output {
        OutputFormat::Table => {
            let fmt_time = |t: Option<sea_orm::prelude::DateTimeWithTimeZone>| {
                t.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string())
            };
            let latest_order = repository::latest_order_date(db, model.id)
                .await?
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());

            let details = vec![
                Detail::new("Name", &model.name),
                Detail::new("Region", model.region),
                Detail::new("API URL", model.api_url()),
                Detail::new("Username", model.masked_username()),
                Detail::new("Orders", model.orders_count),
                Detail::new("Offers", model.offers_count),
                Detail::new("Newest order", latest_order),
                Detail::new("Orders imported", fmt_time(model.last_orders_import)),
                Detail::new("Offers imported", fmt_time(model.last_offers_import)),
                Detail::new("Status", format!("{:?}", model.sync_status).to_lowercase()),
                Detail::new("Last error", model.last_error.as_deref().unwrap_or("-")),
                Detail::new("Created", model.created_at.format("%Y-%m-%d %H:%M:%S %Z")),
                Detail::new("ID", model.id),
            ];
            print_table(details);
        }
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct IntegrationJson {
                #[serde(flatten)]
                integration: IntegrationModel,
                api_url: &'static str,
            }

            print_json(&IntegrationJson {
                api_url: model.api_url(),
                integration: model,
            })?;
        }
    }
    Ok(())
}

async fn remove_integration(
    db: &DatabaseConnection,
    name: &str,
    skip_confirm: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let model = integration::resolve(db, name).await?;
    let orders = repository::count_orders(db, model.id).await?;
    let offers = repository::count_offers(db, model.id).await?;

    if !skip_confirm {
        println!(
            "{} About to remove integration '{}' ({})",
            style("⚠").yellow().bold(),
            style(&model.name).cyan(),
            model.region
        );
        if orders + offers > 0 {
            println!(
                "  {} {} {} and {} {} will also be removed!",
                style("Warning:").yellow().bold(),
                orders,
                plural(orders, "order", "orders"),
                offers,
                plural(offers, "offer", "offers"),
            );
        }
        if !confirm("Continue?")? {
            println!("Aborted.");
            return Ok(());
        }
    }

    integration::delete(db, model.id).await?;
    println!(
        "{} Removed integration '{}' (and {} {}, {} {})",
        style("✓").green().bold(),
        style(&model.name).cyan(),
        orders,
        plural(orders, "order", "orders"),
        offers,
        plural(offers, "offer", "offers"),
    );
    Ok(())
}
