//! Marketplace region an integration belongs to.
//!
//! Each region is a separate eMAG storefront with its own API host and
//! settlement currency.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum Region {
    /// emag.ro
    #[sea_orm(string_value = "ro")]
    Ro,
    /// emag.bg
    #[sea_orm(string_value = "bg")]
    Bg,
    /// emag.hu
    #[sea_orm(string_value = "hu")]
    Hu,
}

impl Region {
    /// Base URL of the Marketplace API (version 3) for this region.
    pub fn api_base_url(self) -> &'static str {
        match self {
            Region::Ro => "https://marketplace-api.emag.ro/api-3",
            Region::Bg => "https://marketplace-api.emag.bg/api-3",
            Region::Hu => "https://marketplace-api.emag.hu/api-3",
        }
    }

    /// ISO 4217 code the storefront settles in.
    pub fn currency(self) -> &'static str {
        match self {
            Region::Ro => "RON",
            Region::Bg => "BGN",
            Region::Hu => "HUF",
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Region::Ro => write!(f, "ro"),
            Region::Bg => write!(f, "bg"),
            Region::Hu => write!(f, "hu"),
        }
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ro" | "romania" | "emag.ro" => Ok(Region::Ro),
            "bg" | "bulgaria" | "emag.bg" => Ok(Region::Bg),
            "hu" | "hungary" | "emag.hu" => Ok(Region::Hu),
            _ => Err(format!("Unknown region: {}", s)),
        }
    }
}
