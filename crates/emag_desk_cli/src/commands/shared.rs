//! Helpers shared by the subcommands: output format, database access and
//! confirmation prompts.

use std::io::{self, Write};
use std::path::Path;

use clap::ValueEnum;
use emag_desk::connect_and_migrate;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

/// Output format for listings and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Display as a formatted table (default)
    #[default]
    Table,
    /// Display as JSON
    Json,
}

/// Two-column property listing used by the `show` commands.
#[derive(Debug, Serialize, Tabled)]
pub(crate) struct Detail {
    #[tabled(rename = "Property")]
    pub property: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl Detail {
    pub(crate) fn new(property: impl Into<String>, value: impl ToString) -> Self {
        Self {
            property: property.into(),
            value: value.to_string(),
        }
    }
}

pub(crate) fn print_table<T: Tabled>(rows: impl IntoIterator<Item = T>) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the database and apply pending migrations, creating the SQLite
/// file's directory first.
pub(crate) async fn open_database(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn std::error::Error>> {
    ensure_sqlite_dir(database_url)?;
    Ok(connect_and_migrate(database_url).await?)
}

/// Create the parent directory of a `sqlite://` database file.
pub(crate) fn ensure_sqlite_dir(database_url: &str) -> io::Result<()> {
    let Some(db_path) = sqlite_path(database_url) else {
        return Ok(());
    };

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// File path of a `sqlite://` URL without its query string; `None` for other
/// schemes and in-memory databases.
fn sqlite_path(database_url: &str) -> Option<&Path> {
    let rest = database_url.strip_prefix("sqlite://")?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(Path::new(path))
}

/// Ask a yes/no question on stdout; anything but `y` is a no.
pub(crate) fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

pub(crate) fn plural<'a>(count: u64, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}
