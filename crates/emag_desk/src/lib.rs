//! emag-desk - order/offer sync and profitability calculator for eMAG
//! marketplace sellers.
//!
//! The library has two independent halves:
//!
//! - **Sync**: [`sync`] pulls orders and product offers for each stored
//!   [`integration`] through a [`platform::MarketplaceClient`] (the
//!   [`emag`] client in production) and appends them to the database with
//!   dedupe.
//! - **Calculator**: [`calculator`] evaluates an offer under the FBM
//!   (non-Genius and Genius) and FBE profiles; [`selection`] says which
//!   offer or saved calculation is being evaluated.
//!
//! # Features
//!
//! - `emag` - reqwest transport and the eMAG Marketplace API client.
//! - `sqlite` - SQLite driver for sea-orm.
//! - `migrate` - schema migrations and [`connect_and_migrate`].
//!
//! # Example
//!
//! ```ignore
//! use emag_desk::{connect_and_migrate, integration};
//! use emag_desk::emag::{EmagClient, EmagClientOptions};
//! use emag_desk::sync::SyncContext;
//!
//! let db = Arc::new(connect_and_migrate("sqlite://emag-desk.db?mode=rwc").await?);
//! let ctx = SyncContext::builder().database(db.clone()).build()?;
//!
//! let account = integration::resolve(&db, "main-ro").await?;
//! let client = EmagClient::new(&account, &EmagClientOptions::default())?;
//! let report = ctx.sync_integration(Arc::new(client), &account).await?;
//! ```

pub mod calculator;
pub mod db;
pub mod entity;
pub mod http;
pub mod integration;
pub mod platform;
pub mod repository;
pub mod retry;
pub mod selection;
pub mod sync;

#[cfg(feature = "emag")]
pub mod emag;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use platform::{MarketplaceClient, PlatformError, Resource, rate_limits};
pub use repository::RepositoryError;
pub use selection::{ResolvedSelection, Selection, SelectionError};
