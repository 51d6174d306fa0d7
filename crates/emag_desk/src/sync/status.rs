//! Sync status transitions and the bus that announces them.
//!
//! The [`StatusReconciler`] keeps an in-memory view of every integration's
//! status for the lifetime of a run and mirrors each change to the database
//! before publishing it. Observers subscribe to the [`StatusBus`] instead of
//! polling the integration rows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entity::integration::Model as IntegrationModel;
use crate::entity::sync_status::SyncStatus;
use crate::integration::{self, IntegrationError};
use crate::platform::Resource;

/// Error stored on integrations whose run died while loading.
pub const INTERRUPTED_MESSAGE: &str = "interrupted";

/// Transitions buffered per subscriber before the slowest one starts lagging.
pub const STATUS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Invalid status transition for {integration}: {from} -> {to}")]
    InvalidTransition {
        integration: String,
        from: SyncStatus,
        to: SyncStatus,
    },

    #[error("A sync is already running for {0}")]
    AlreadyRunning(String),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// One status change, as published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StatusTransition {
    pub integration_id: Uuid,
    pub integration: String,
    pub from: SyncStatus,
    pub to: SyncStatus,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Broadcast channel of status transitions.
#[derive(Debug, Clone)]
pub struct StatusBus {
    sender: broadcast::Sender<StatusTransition>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(STATUS_CHANNEL_CAPACITY)
    }
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the transition.
    pub fn publish(&self, transition: StatusTransition) -> usize {
        self.sender.send(transition).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Validates, persists and publishes status transitions.
pub struct StatusReconciler {
    db: Option<Arc<DatabaseConnection>>,
    bus: StatusBus,
    current: Mutex<HashMap<Uuid, SyncStatus>>,
}

impl StatusReconciler {
    /// Without a database, transitions are validated and published only.
    pub fn new(db: Option<Arc<DatabaseConnection>>, bus: StatusBus) -> Self {
        Self {
            db,
            bus,
            current: Mutex::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusTransition> {
        self.bus.subscribe()
    }

    /// Status as known to this reconciler, if it has seen the integration.
    pub fn status_of(&self, id: Uuid) -> Option<SyncStatus> {
        self.lock_current().get(&id).copied()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, SyncStatus>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fresh(&self, integration: &IntegrationModel) -> Result<IntegrationModel, StatusError> {
        match &self.db {
            Some(db) => integration::find_by_id(db, integration.id)
                .await?
                .ok_or_else(|| {
                    StatusError::Integration(IntegrationError::NotFound(integration.id.to_string()))
                }),
            None => Ok(integration.clone()),
        }
    }

    async fn apply(
        &self,
        integration: &IntegrationModel,
        from: SyncStatus,
        to: SyncStatus,
        error: Option<String>,
    ) -> Result<StatusTransition, StatusError> {
        self.transition(integration, from, to, error, true).await
    }

    /// With `remember` unset the in-memory status is left alone, so a run
    /// reserved by [`begin`](Self::begin) stays visible while its stale row
    /// is closed.
    async fn transition(
        &self,
        integration: &IntegrationModel,
        from: SyncStatus,
        to: SyncStatus,
        error: Option<String>,
        remember: bool,
    ) -> Result<StatusTransition, StatusError> {
        if !from.can_transition_to(to) {
            return Err(StatusError::InvalidTransition {
                integration: integration.name.clone(),
                from,
                to,
            });
        }

        if let Some(db) = &self.db {
            integration::persist_status(db, integration.id, to, error.clone()).await?;
        }
        if remember {
            self.lock_current().insert(integration.id, to);
        }

        let transition = StatusTransition {
            integration_id: integration.id,
            integration: integration.name.clone(),
            from,
            to,
            error: if to == SyncStatus::Error { error } else { None },
            at: Utc::now(),
        };
        tracing::debug!(
            integration = %transition.integration,
            from = %from,
            to = %to,
            "Sync status changed"
        );
        self.bus.publish(transition.clone());
        Ok(transition)
    }

    /// Move an integration to `loading`.
    ///
    /// Refuses when this reconciler already has a run in flight for it. A
    /// `loading` row it does not know about is a leftover of a dead run and
    /// is first marked as interrupted.
    pub async fn begin(
        &self,
        integration: &IntegrationModel,
    ) -> Result<StatusTransition, StatusError> {
        {
            let mut current = self.lock_current();
            if current.get(&integration.id) == Some(&SyncStatus::Loading) {
                return Err(StatusError::AlreadyRunning(integration.name.clone()));
            }
            // reserve the slot so a concurrent begin sees the run
            current.insert(integration.id, SyncStatus::Loading);
        }

        let result = self.begin_reserved(integration).await;
        if result.is_err() {
            self.lock_current().remove(&integration.id);
        }
        result
    }

    async fn begin_reserved(
        &self,
        integration: &IntegrationModel,
    ) -> Result<StatusTransition, StatusError> {
        let fresh = self.fresh(integration).await?;
        let mut from = fresh.sync_status;

        if from == SyncStatus::Loading {
            tracing::warn!(
                integration = %fresh.name,
                "Found a stale loading status, marking it interrupted"
            );
            self.transition(
                &fresh,
                SyncStatus::Loading,
                SyncStatus::Error,
                Some(INTERRUPTED_MESSAGE.to_string()),
                false,
            )
            .await?;
            from = SyncStatus::Error;
        }

        self.apply(&fresh, from, SyncStatus::Loading, None).await
    }

    /// Finish a run successfully, refreshing stored counts and import times
    /// for the resources that were synced.
    pub async fn succeed(
        &self,
        integration: &IntegrationModel,
        resources: &[Resource],
    ) -> Result<StatusTransition, StatusError> {
        if let Some(db) = &self.db {
            integration::record_import(db, integration.id, resources).await?;
        }
        let from = self.running_status(integration);
        self.apply(integration, from, SyncStatus::Success, None).await
    }

    /// Finish a run with an error message.
    pub async fn fail(
        &self,
        integration: &IntegrationModel,
        message: impl Into<String>,
    ) -> Result<StatusTransition, StatusError> {
        let from = self.running_status(integration);
        self.apply(integration, from, SyncStatus::Error, Some(message.into()))
            .await
    }

    /// Return an integration to `idle` from any state.
    pub async fn reset(
        &self,
        integration: &IntegrationModel,
    ) -> Result<StatusTransition, StatusError> {
        let from = self
            .status_of(integration.id)
            .unwrap_or(integration.sync_status);
        self.apply(integration, from, SyncStatus::Idle, None).await
    }

    fn running_status(&self, integration: &IntegrationModel) -> SyncStatus {
        self.status_of(integration.id)
            .unwrap_or(integration.sync_status)
    }

    /// Mark every integration stuck in `loading` without a run in this
    /// reconciler as failed with [`INTERRUPTED_MESSAGE`].
    pub async fn reconcile_stale(&self) -> Result<Vec<StatusTransition>, StatusError> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };

        let stuck = integration::find_by_status(db, SyncStatus::Loading).await?;
        let mut transitions = Vec::new();
        for model in stuck {
            if self.status_of(model.id) == Some(SyncStatus::Loading) {
                continue;
            }
            tracing::info!(integration = %model.name, "Marking interrupted sync as failed");
            transitions.push(
                self.apply(
                    &model,
                    SyncStatus::Loading,
                    SyncStatus::Error,
                    Some(INTERRUPTED_MESSAGE.to_string()),
                )
                .await?,
            );
        }
        Ok(transitions)
    }
}
