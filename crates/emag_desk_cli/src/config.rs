//! Configuration file support for emag-desk.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `EMAG_DESK_`, e.g., `EMAG_DESK_DATABASE_URL`)
//! 3. Config file (./emag-desk.toml, then ~/.config/emag-desk/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/emag-desk/emag-desk.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite:///var/lib/emag-desk/emag-desk.db?mode=rwc"
//!
//! [emag]
//! page_size = 100
//! batch_size = 5
//! timeout_secs = 30
//! orders_rps = 12
//! default_rps = 3
//!
//! [sync]
//! persist_batch_size = 200
//! dry_run = false
//!
//! [calculator]
//! vat_rate_percent = "21"
//! vat_payer = true
//! income_tax = "micro"      # or "profit"
//! micro_rate_percent = "1"
//! profit_rate_percent = "16"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use emag_desk::calculator::{
    CalculatorInput, DEFAULT_MICRO_RATE_PERCENT, DEFAULT_PROFIT_RATE_PERCENT,
    DEFAULT_VAT_RATE_PERCENT, IncomeTax,
};
use emag_desk::emag::{DEFAULT_TIMEOUT_SECS, EmagClientOptions};
use emag_desk::rate_limits;
use emag_desk::sync::{DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, SyncOptions};
use emag_desk::sync::persist_task::PERSIST_BATCH_SIZE;
use rust_decimal::Decimal;
use serde::Deserialize;

const APP_NAME: &str = "emag-desk";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub emag: EmagConfig,
    pub sync: SyncConfig,
    pub calculator: CalculatorConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Defaults to `sqlite://~/.local/state/emag-desk/emag-desk.db` if not specified.
    pub url: Option<String>,
}

/// Marketplace API client settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmagConfig {
    /// Records per page (the API caps this at 100).
    pub page_size: u32,
    /// Pages requested concurrently.
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Requests per second for `order/*`.
    pub orders_rps: u32,
    /// Requests per second for every other resource.
    pub default_rps: u32,
    /// Replaces the region's API host, for sandboxes.
    pub base_url: Option<String>,
}

impl Default for EmagConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            orders_rps: rate_limits::EMAG_ORDERS_RPS,
            default_rps: rate_limits::EMAG_DEFAULT_RPS,
            base_url: None,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Rows written per database transaction.
    pub persist_batch_size: usize,
    /// Fetch without writing unless a flag says otherwise.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            persist_batch_size: PERSIST_BATCH_SIZE,
            dry_run: false,
        }
    }
}

/// Defaults applied to every new calculation.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    pub vat_rate_percent: Decimal,
    pub vat_payer: bool,
    /// `micro` or `profit`.
    pub income_tax: String,
    pub micro_rate_percent: Decimal,
    pub profit_rate_percent: Decimal,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            vat_rate_percent: DEFAULT_VAT_RATE_PERCENT,
            vat_payer: true,
            income_tax: "micro".to_string(),
            micro_rate_percent: DEFAULT_MICRO_RATE_PERCENT,
            profit_rate_percent: DEFAULT_PROFIT_RATE_PERCENT,
        }
    }
}

impl CalculatorConfig {
    /// An unknown regime name falls back to micro with a warning.
    pub fn income_tax(&self) -> IncomeTax {
        IncomeTax::from_name(
            &self.income_tax,
            self.micro_rate_percent,
            self.profit_rate_percent,
        )
        .unwrap_or_else(|| {
            tracing::warn!(regime = %self.income_tax, "Unknown income tax regime, using micro");
            IncomeTax::Micro {
                rate_percent: self.micro_rate_percent,
            }
        })
    }

    pub fn defaults(&self) -> CalculatorInput {
        CalculatorInput {
            vat_rate_percent: self.vat_rate_percent,
            vat_payer: self.vat_payer,
            income_tax: self.income_tax(),
            ..CalculatorInput::default()
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/emag-desk/config.toml)
    /// 3. Local config file (./emag-desk.toml)
    /// 4. Environment variables with EMAG_DESK_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("emag-desk.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./emag-desk.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // EMAG_DESK_DATABASE_URL -> database.url; keys that contain an
        // underscore themselves are only reachable from files
        builder = builder.add_source(
            Environment::with_prefix("EMAG_DESK")
                .separator("_")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => Self::from_settings(settings),
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    fn from_settings(settings: config::Config) -> Self {
        match settings.try_deserialize::<Config>() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to deserialize config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// `mode=rwc` opens the file read-write and creates it if missing.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("emag-desk.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn client_options(&self) -> EmagClientOptions {
        EmagClientOptions {
            timeout: Duration::from_secs(self.emag.timeout_secs.max(1)),
            orders_rps: self.emag.orders_rps,
            default_rps: self.emag.default_rps,
            base_url: self.emag.base_url.clone(),
            ..EmagClientOptions::default()
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            dry_run: self.sync.dry_run,
            page_size: self.emag.page_size,
            batch_size: self.emag.batch_size,
            ..SyncOptions::default()
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// On Linux, this is `$XDG_STATE_HOME/emag-desk` or `~/.local/state/emag-desk`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(toml: &str) -> Config {
        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap();
        Config::from_settings(settings)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert_eq!(config.emag.page_size, 100);
        assert_eq!(config.emag.batch_size, 5);
        assert_eq!(config.emag.orders_rps, 12);
        assert_eq!(config.emag.default_rps, 3);
        assert!(!config.sync.dry_run);
        assert_eq!(config.calculator.vat_rate_percent, dec!(21));
        assert_eq!(config.calculator.income_tax(), IncomeTax::micro());
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = parse(
            r#"
            [emag]
            page_size = 50

            [calculator]
            income_tax = "profit"
            profit_rate_percent = "16"
            vat_payer = false
        "#,
        );

        assert_eq!(config.emag.page_size, 50);
        assert_eq!(config.emag.batch_size, 5);
        assert_eq!(
            config.calculator.income_tax(),
            IncomeTax::Profit {
                rate_percent: dec!(16)
            }
        );

        let defaults = config.calculator.defaults();
        assert!(!defaults.vat_payer);
        assert_eq!(defaults.vat_rate_percent, dec!(21));
    }

    #[test]
    fn test_unknown_regime_falls_back_to_micro() {
        let config = parse(
            r#"
            [calculator]
            income_tax = "flat"
            micro_rate_percent = "3"
        "#,
        );
        assert_eq!(
            config.calculator.income_tax(),
            IncomeTax::Micro {
                rate_percent: dec!(3)
            }
        );
    }

    #[test]
    fn test_malformed_values_fall_back_to_defaults() {
        let config = parse(
            r#"
            [emag]
            page_size = "lots"
        "#,
        );
        assert_eq!(config.emag.page_size, 100);
    }

    #[test]
    fn test_invalid_toml_is_rejected_by_the_builder() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[emag\npage_size = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_sync_and_client_options_follow_config() {
        let config = parse(
            r#"
            [emag]
            batch_size = 2
            timeout_secs = 0
            orders_rps = 6
            base_url = "http://localhost:9000/api-3"

            [sync]
            dry_run = true
        "#,
        );

        let sync = config.sync_options();
        assert!(sync.dry_run);
        assert_eq!(sync.batch_size, 2);

        let client = config.client_options();
        assert_eq!(client.timeout, Duration::from_secs(1));
        assert_eq!(client.orders_rps, 6);
        assert_eq!(client.default_rps, 3);
        assert_eq!(client.base_url.as_deref(), Some("http://localhost:9000/api-3"));
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let url = Config::default().database_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("emag-desk.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = parse(
            r#"
            [database]
            url = "sqlite:///tmp/shop.db"
        "#,
        );
        assert_eq!(config.database_url().as_deref(), Some("sqlite:///tmp/shop.db"));
    }
}
