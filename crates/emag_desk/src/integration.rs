//! Integration management service.
//!
//! Create, look up and remove seller accounts, and write the status and
//! import statistics the sync keeps on each one.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::integration::{self, ActiveModel, Entity, Model};
use crate::entity::region::Region;
use crate::entity::sync_status::SyncStatus;
use crate::platform::Resource;
use crate::repository::{self, RepositoryError};

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Integration not found: {0}")]
    NotFound(String),

    #[error("Integration '{0}' already exists")]
    AlreadyExists(String),

    #[error("Invalid integration: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Fields needed to register a seller account.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub name: String,
    pub region: Region,
    pub username: String,
    pub password: String,
}

impl NewIntegration {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(IntegrationError::InvalidInput("name is empty".to_string()));
        }
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(IntegrationError::InvalidInput(
                "username and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn create(db: &DatabaseConnection, new: NewIntegration) -> Result<Model> {
    new.validate()?;
    let name = new.name.trim().to_string();

    if find_by_name(db, &name).await?.is_some() {
        return Err(IntegrationError::AlreadyExists(name));
    }

    let now = Utc::now().fixed_offset();
    let model = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        region: Set(new.region),
        username: Set(new.username.trim().to_string()),
        password: Set(new.password),
        orders_count: Set(0),
        offers_count: Set(0),
        last_orders_import: Set(None),
        last_offers_import: Set(None),
        sync_status: Set(SyncStatus::Idle),
        last_error: Set(None),
        status_updated_at: Set(now),
        created_at: Set(now),
    }
    .insert(db)
    .await?;

    tracing::info!(integration = %model.name, region = %model.region, "Integration created");
    Ok(model)
}

pub async fn find_by_name(db: &DatabaseConnection, name: &str) -> Result<Option<Model>> {
    Ok(Entity::find()
        .filter(integration::Column::Name.eq(name))
        .one(db)
        .await?)
}

pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    Ok(Entity::find_by_id(id).one(db).await?)
}

/// Look up by UUID when `key` parses as one, by name otherwise.
pub async fn resolve(db: &DatabaseConnection, key: &str) -> Result<Model> {
    let found = match Uuid::parse_str(key) {
        Ok(id) => find_by_id(db, id).await?,
        Err(_) => find_by_name(db, key).await?,
    };
    found.ok_or_else(|| IntegrationError::NotFound(key.to_string()))
}

pub async fn list(db: &DatabaseConnection) -> Result<Vec<Model>> {
    Ok(Entity::find()
        .order_by_asc(integration::Column::Name)
        .all(db)
        .await?)
}

pub async fn find_by_status(db: &DatabaseConnection, status: SyncStatus) -> Result<Vec<Model>> {
    Ok(Entity::find()
        .filter(integration::Column::SyncStatus.eq(status))
        .all(db)
        .await?)
}

/// Remove an integration; its orders and offers go with it. Returns whether
/// a row was deleted.
pub async fn delete(db: &DatabaseConnection, id: Uuid) -> Result<bool> {
    let result = Entity::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

pub async fn update_credentials(
    db: &DatabaseConnection,
    id: Uuid,
    username: &str,
    password: &str,
) -> Result<Model> {
    let existing = find_by_id(db, id)
        .await?
        .ok_or_else(|| IntegrationError::NotFound(id.to_string()))?;

    let mut active: ActiveModel = existing.into();
    active.username = Set(username.trim().to_string());
    active.password = Set(password.to_string());
    Ok(active.update(db).await?)
}

/// Write a status change. Starting a run (`loading`) clears the previous
/// error message.
pub async fn persist_status(
    db: &DatabaseConnection,
    id: Uuid,
    status: SyncStatus,
    error: Option<String>,
) -> Result<Model> {
    let existing = find_by_id(db, id)
        .await?
        .ok_or_else(|| IntegrationError::NotFound(id.to_string()))?;

    let mut active: ActiveModel = existing.into();
    active.sync_status = Set(status);
    active.last_error = Set(match status {
        SyncStatus::Error => error,
        _ => None,
    });
    active.status_updated_at = Set(Utc::now().fixed_offset());
    Ok(active.update(db).await?)
}

/// Refresh stored counts and stamp the import time of every resource that
/// was just synced.
pub async fn record_import(
    db: &DatabaseConnection,
    id: Uuid,
    resources: &[Resource],
) -> Result<Model> {
    let existing = find_by_id(db, id)
        .await?
        .ok_or_else(|| IntegrationError::NotFound(id.to_string()))?;

    let orders = repository::count_orders(db, id).await?;
    let offers = repository::count_offers(db, id).await?;
    let now = Utc::now().fixed_offset();

    let mut active: ActiveModel = existing.into();
    active.orders_count = Set(i64::try_from(orders).unwrap_or(i64::MAX));
    active.offers_count = Set(i64::try_from(offers).unwrap_or(i64::MAX));
    if resources.contains(&Resource::Orders) {
        active.last_orders_import = Set(Some(now));
    }
    if resources.contains(&Resource::ProductOffers) {
        active.last_offers_import = Set(Some(now));
    }
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn new_integration(name: &str) -> NewIntegration {
        NewIntegration {
            name: name.to_string(),
            region: Region::Ro,
            username: "seller@shop.ro".to_string(),
            password: "secret".to_string(),
        }
    }

    fn model(name: &str) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            region: Region::Ro,
            username: "seller@shop.ro".to_string(),
            password: "secret".to_string(),
            orders_count: 0,
            offers_count: 0,
            last_orders_import: None,
            last_offers_import: None,
            sync_status: SyncStatus::Idle,
            last_error: None,
            status_updated_at: now,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let err = create(&db, new_integration("  "))
            .await
            .expect_err("blank name should fail");
        assert!(matches!(err, IntegrationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([vec![model("main")]])
            .into_connection();

        let err = create(&db, new_integration("main"))
            .await
            .expect_err("duplicate should fail");
        assert!(matches!(err, IntegrationError::AlreadyExists(name) if name == "main"));
    }

    #[tokio::test]
    async fn resolve_reports_unknown_key() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();

        let err = resolve(&db, "nope").await.expect_err("missing should fail");
        assert!(matches!(err, IntegrationError::NotFound(key) if key == "nope"));
    }

    #[tokio::test]
    async fn persist_status_fails_for_missing_integration() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<Model>::new()])
            .into_connection();

        let err = persist_status(&db, Uuid::new_v4(), SyncStatus::Loading, None)
            .await
            .expect_err("missing integration should fail");
        assert!(matches!(err, IntegrationError::NotFound(_)));
    }
}
