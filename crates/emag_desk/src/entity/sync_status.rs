//! Persisted sync status of an integration.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of the last sync run for an integration.
///
/// Valid moves are `idle | success | error -> loading`,
/// `loading -> success | error`, and a reset from anything to `idle`.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    #[sea_orm(string_value = "idle")]
    Idle,
    #[sea_orm(string_value = "loading")]
    Loading,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "error")]
    Error,
}

impl SyncStatus {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: SyncStatus) -> bool {
        match (self, next) {
            (_, SyncStatus::Idle) => true,
            (SyncStatus::Loading, SyncStatus::Success | SyncStatus::Error) => true,
            (SyncStatus::Idle | SyncStatus::Success | SyncStatus::Error, SyncStatus::Loading) => {
                true
            }
            _ => false,
        }
    }

    /// A run is in flight.
    pub fn is_active(self) -> bool {
        self == SyncStatus::Loading
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Loading => write!(f, "loading"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SyncStatus::Idle),
            "loading" => Ok(SyncStatus::Loading),
            "success" => Ok(SyncStatus::Success),
            "error" => Ok(SyncStatus::Error),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}
