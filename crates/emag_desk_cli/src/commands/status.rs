//! Sync status of every integration, and manual resets.

use std::sync::Arc;

use console::style;
use emag_desk::integration;
use emag_desk::sync::{StatusBus, StatusReconciler};
use emag_desk::{IntegrationModel, SyncStatus};
use sea_orm::DatabaseConnection;
use tabled::Tabled;

use super::shared::{OutputFormat, print_json, print_table};

#[derive(Debug, serde::Serialize, Tabled)]
struct StatusRow {
    #[tabled(rename = "Integration")]
    integration: String,
    #[tabled(rename = "Status")]
    status: SyncStatusCell,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Orders")]
    orders: i64,
    #[tabled(rename = "Offers")]
    offers: i64,
    #[tabled(rename = "Last error")]
    last_error: String,
}

/// Status rendered lowercase in tables and as its serde name in JSON.
#[derive(Debug, serde::Serialize)]
#[serde(transparent)]
struct SyncStatusCell(SyncStatus);

impl std::fmt::Display for SyncStatusCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.0 {
            SyncStatus::Idle => "idle",
            SyncStatus::Loading => "loading",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
        };
        f.write_str(label)
    }
}

impl From<&IntegrationModel> for StatusRow {
    fn from(model: &IntegrationModel) -> Self {
        Self {
            integration: model.name.clone(),
            status: SyncStatusCell(model.sync_status),
            since: model.status_updated_at.format("%Y-%m-%d %H:%M").to_string(),
            orders: model.orders_count,
            offers: model.offers_count,
            last_error: model.last_error.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle_status(
    reset: Option<String>,
    output: OutputFormat,
    db: DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(db);

    if let Some(key) = reset {
        let model = integration::resolve(&db, &key).await?;
        let reconciler = StatusReconciler::new(Some(Arc::clone(&db)), StatusBus::default());
        let transition = reconciler.reset(&model).await?;
        println!(
            "{} '{}' moved from {} to {}",
            style("✓").green().bold(),
            style(&transition.integration).cyan(),
            SyncStatusCell(transition.from),
            SyncStatusCell(transition.to)
        );
        return Ok(());
    }

    let rows: Vec<StatusRow> = integration::list(&db)
        .await?
        .iter()
        .map(StatusRow::from)
        .collect();

    match output {
        OutputFormat::Table if rows.is_empty() => println!("No integrations configured."),
        OutputFormat::Table => print_table(rows),
        OutputFormat::Json => print_json(&rows)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_cell_matches_the_stored_value() {
        for status in [
            SyncStatus::Idle,
            SyncStatus::Loading,
            SyncStatus::Success,
            SyncStatus::Error,
        ] {
            let json = serde_json::to_value(SyncStatusCell(status)).unwrap();
            assert_eq!(json, SyncStatusCell(status).to_string());
        }
    }
}
