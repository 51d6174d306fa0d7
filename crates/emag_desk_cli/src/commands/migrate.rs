use console::style;
use emag_desk::db;
use emag_desk::migration::{Migrator, MigratorTrait};
use tabled::Tabled;

use super::shared::{confirm, ensure_sqlite_dir, print_table};
use crate::MigrateAction;

#[derive(Tabled)]
struct MigrationRow {
    #[tabled(rename = "Migration")]
    name: String,
    #[tabled(rename = "State")]
    state: &'static str,
}

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    ensure_sqlite_dir(database_url)?;
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            let pending = Migrator::get_pending_migrations(&db).await?.len();
            Migrator::up(&db, None).await?;
            println!(
                "{} Schema up to date ({} applied)",
                style("✓").green().bold(),
                pending
            );
        }
        MigrateAction::Down => {
            Migrator::down(&db, Some(1)).await?;
            println!("{} Rolled back the last migration", style("✓").green().bold());
        }
        MigrateAction::Status => {
            let applied = Migrator::get_applied_migrations(&db).await?;
            let pending = Migrator::get_pending_migrations(&db).await?;
            let rows = applied
                .iter()
                .map(|m| MigrationRow {
                    name: m.name().to_string(),
                    state: "applied",
                })
                .chain(pending.iter().map(|m| MigrationRow {
                    name: m.name().to_string(),
                    state: "pending",
                }));
            print_table(rows);
        }
        MigrateAction::Fresh { yes } => {
            if !yes
                && !confirm("This drops every integration, order, offer and saved calculation. Continue?")?
            {
                println!("Aborted.");
                return Ok(());
            }
            Migrator::fresh(&db).await?;
            println!("{} Database recreated", style("✓").green().bold());
        }
    }

    Ok(())
}
