//! Order and offer import for one or all integrations.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use console::style;
use emag_desk::emag::EmagClient;
use emag_desk::integration;
use emag_desk::sync::{IntegrationSyncResult, KindReport, SyncContext, SyncOptions};
use emag_desk::{IntegrationModel, PlatformError, Resource};
use tabled::Tabled;

use super::shared::{OutputFormat, open_database, print_json, print_table};
use crate::config::Config;
use crate::progress::{ProgressReporter, watch_statuses};

/// Flags of the `sync` command.
#[derive(Debug, Clone, clap::Args)]
pub struct SyncArgs {
    /// Integration name or id (repeatable); every integration when omitted
    #[arg(short, long = "integration", value_name = "NAME")]
    integrations: Vec<String>,

    /// Sync orders (both resources when neither --orders nor --offers is given)
    #[arg(long)]
    orders: bool,

    /// Sync product offers
    #[arg(long)]
    offers: bool,

    /// Ignore the incremental window and fetch every order again
    #[arg(short, long)]
    full: bool,

    /// Fetch without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Output format of the summary
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

impl SyncArgs {
    fn resources(&self) -> Vec<Resource> {
        match (self.orders, self.offers) {
            (true, false) => vec![Resource::Orders],
            (false, true) => vec![Resource::ProductOffers],
            _ => vec![Resource::Orders, Resource::ProductOffers],
        }
    }

    fn options(&self, config: &Config) -> SyncOptions {
        let mut options = config.sync_options();
        options.full = self.full;
        options.dry_run |= self.dry_run;
        options.resources = self.resources();
        options
    }
}

/// One summary line: an integration's resource, or its failure.
#[derive(Debug, serde::Serialize, Tabled)]
struct SyncRow {
    #[tabled(rename = "Integration")]
    integration: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Fetched")]
    fetched: u64,
    #[tabled(rename = "New")]
    inserted: u64,
    #[tabled(rename = "Skipped")]
    skipped: u64,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Result")]
    result: String,
}

impl SyncRow {
    fn from_kind(integration: &str, resource: Resource, report: &KindReport) -> Self {
        Self {
            integration: integration.to_string(),
            resource: resource.to_string(),
            fetched: report.fetched,
            inserted: report.inserted,
            skipped: report.skipped,
            since: report
                .window_start
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
            result: "ok".to_string(),
        }
    }

    fn from_result(result: &IntegrationSyncResult) -> Vec<Self> {
        match &result.result {
            Ok(report) => [Resource::Orders, Resource::ProductOffers]
                .into_iter()
                .filter_map(|resource| {
                    report
                        .get(resource)
                        .map(|kind| Self::from_kind(&result.integration, resource, kind))
                })
                .collect(),
            Err(e) => vec![Self {
                integration: result.integration.clone(),
                resource: "-".to_string(),
                fetched: 0,
                inserted: 0,
                skipped: 0,
                since: "-".to_string(),
                result: format!("error: {}", e),
            }],
        }
    }
}

#[derive(serde::Serialize)]
struct SyncJson<'a> {
    integration: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a emag_desk::sync::SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn handle_sync(
    args: SyncArgs,
    config: &Config,
    database_url: &str,
    shutdown: Arc<AtomicBool>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(open_database(database_url).await?);

    let integrations = select_integrations(&db, &args.integrations).await?;
    if integrations.is_empty() {
        println!("No integrations to sync. Add one with: emag-desk integration add");
        return Ok(());
    }

    let options = args.options(config);
    let dry_run = options.dry_run;
    let reporter = Arc::new(ProgressReporter::new());
    let ctx = SyncContext::builder()
        .options(options)
        .database(Arc::clone(&db))
        .progress(reporter.as_callback())
        .shutdown_flag(shutdown)
        .persist_batch_size(config.sync.persist_batch_size)
        .build()?;

    let watcher = watch_statuses(Arc::clone(&reporter), ctx.subscribe());
    ctx.reconcile_stale().await?;

    tracing::info!(
        integrations = integrations.len(),
        dry_run,
        full = args.full,
        "Starting sync"
    );

    let client_options = config.client_options();
    let results = ctx
        .sync_all(integrations, |model| {
            EmagClient::new(model, &client_options).map_err(PlatformError::from)
        })
        .await;

    reporter.finish();
    // dropping the context closes the status bus and ends the watcher
    drop(ctx);
    join_watcher(watcher).await;

    print_summary(&results, args.output, dry_run)?;

    let failed = results.iter().filter(|r| r.result.is_err()).count();
    if failed > 0 {
        return Err(format!("{} of {} integrations failed to sync", failed, results.len()).into());
    }
    Ok(())
}

/// Wait for the status watcher; returns false when it died instead of
/// ending with the bus.
async fn join_watcher(watcher: tokio::task::JoinHandle<()>) -> bool {
    match watcher.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Status watcher ended abnormally");
            false
        }
    }
}

async fn select_integrations(
    db: &sea_orm::DatabaseConnection,
    keys: &[String],
) -> Result<Vec<IntegrationModel>, Box<dyn std::error::Error>> {
    if keys.is_empty() {
        return Ok(integration::list(db).await?);
    }

    let mut selected: Vec<IntegrationModel> = Vec::with_capacity(keys.len());
    for key in keys {
        let model = integration::resolve(db, key).await?;
        if !selected.iter().any(|m| m.id == model.id) {
            selected.push(model);
        }
    }
    Ok(selected)
}

fn print_summary(
    results: &[IntegrationSyncResult],
    output: OutputFormat,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Table => {
            let rows: Vec<SyncRow> = results.iter().flat_map(SyncRow::from_result).collect();
            if !rows.is_empty() {
                print_table(rows);
            }
            if dry_run {
                println!("{} Dry run: nothing was written.", style("ℹ").blue().bold());
            }
        }
        OutputFormat::Json => {
            let json: Vec<SyncJson<'_>> = results
                .iter()
                .map(|r| SyncJson {
                    integration: &r.integration,
                    report: r.result.as_ref().ok(),
                    error: r.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect();
            print_json(&json)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use emag_desk::sync::{SyncError, SyncReport};
    use uuid::Uuid;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SyncArgs,
    }

    fn parse(argv: &[&str]) -> SyncArgs {
        let mut full = vec!["sync"];
        full.extend_from_slice(argv);
        Harness::parse_from(full).args
    }

    #[tokio::test]
    async fn watcher_panics_are_reported_not_propagated() {
        assert!(join_watcher(tokio::spawn(async {})).await);
        let panicked = tokio::spawn(async { panic!("watcher gave up") });
        assert!(!join_watcher(panicked).await);
    }

    #[test]
    fn both_resources_by_default() {
        assert_eq!(
            parse(&[]).resources(),
            vec![Resource::Orders, Resource::ProductOffers]
        );
        assert_eq!(
            parse(&["--orders", "--offers"]).resources(),
            vec![Resource::Orders, Resource::ProductOffers]
        );
        assert_eq!(parse(&["--offers"]).resources(), vec![Resource::ProductOffers]);
    }

    #[test]
    fn flags_override_config() {
        let config = Config::default();
        let options = parse(&["--full", "-n", "-i", "shop-ro", "-i", "shop-bg"]).options(&config);
        assert!(options.full);
        assert!(options.dry_run);
        assert_eq!(options.page_size, config.emag.page_size);
    }

    #[test]
    fn summary_rows_cover_reports_and_errors() {
        let mut report = SyncReport::new(Uuid::new_v4(), "shop-ro", false);
        report.set(
            Resource::Orders,
            KindReport {
                fetched: 7,
                inserted: 5,
                skipped: 2,
                ..KindReport::default()
            },
        );
        let ok = IntegrationSyncResult {
            integration_id: report.integration_id,
            integration: "shop-ro".to_string(),
            result: Ok(report),
        };
        let failed = IntegrationSyncResult {
            integration_id: Uuid::new_v4(),
            integration: "shop-bg".to_string(),
            result: Err(SyncError::Interrupted),
        };

        let rows = SyncRow::from_result(&ok);
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].inserted, rows[0].skipped), (5, 2));
        assert_eq!(rows[0].since, "-");

        let rows = SyncRow::from_result(&failed);
        assert_eq!(rows[0].result, "error: interrupted");
    }
}
