use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    sea_query::OnConflict,
};

use crate::entity::{order, product_offer};

use super::errors::{RepositoryError, Result};

/// Default number of retry attempts for deduped inserts.
pub const DEFAULT_INSERT_RETRIES: u32 = 3;

/// Default initial backoff in milliseconds for deduped insert retries.
pub const DEFAULT_INSERT_BACKOFF_MS: u64 = 100;

/// Entities whose rows are unique per `(integration_id, emag_id)`.
pub trait DedupeKey: EntityTrait {
    fn dedupe_columns() -> [Self::Column; 2];
}

impl DedupeKey for order::Entity {
    fn dedupe_columns() -> [order::Column; 2] {
        [order::Column::IntegrationId, order::Column::EmagId]
    }
}

impl DedupeKey for product_offer::Entity {
    fn dedupe_columns() -> [product_offer::Column; 2] {
        [
            product_offer::Column::IntegrationId,
            product_offer::Column::EmagId,
        ]
    }
}

/// Rows written versus rows that already existed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct InsertOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

impl InsertOutcome {
    /// `attempted` rows were sent and `inserted` made it in.
    pub fn from_counts(attempted: u64, inserted: u64) -> Self {
        Self {
            inserted,
            skipped: attempted.saturating_sub(inserted),
        }
    }

    pub fn total(&self) -> u64 {
        self.inserted + self.skipped
    }
}

impl std::ops::AddAssign for InsertOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.skipped += rhs.skipped;
    }
}

pub(crate) fn build_dedupe_on_conflict<E: DedupeKey>() -> OnConflict {
    OnConflict::columns(E::dedupe_columns())
        .do_nothing()
        .to_owned()
}

/// Insert rows, silently skipping any whose dedupe key already exists.
pub async fn insert_deduped<A>(db: &DatabaseConnection, models: Vec<A>) -> Result<InsertOutcome>
where
    A: ActiveModelTrait + Send,
    A::Entity: DedupeKey,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    if models.is_empty() {
        return Ok(InsertOutcome::default());
    }

    let attempted = models.len() as u64;
    let inserted = <A::Entity as EntityTrait>::insert_many(models)
        .on_conflict(build_dedupe_on_conflict::<A::Entity>())
        .exec_without_returning(db)
        .await?;

    Ok(InsertOutcome::from_counts(attempted, inserted))
}

/// [`insert_deduped`] with retries for transient database errors
/// (locked, busy, dropped connection). The backoff doubles per attempt.
pub async fn insert_deduped_with_retry<A>(
    db: &DatabaseConnection,
    models: Vec<A>,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<InsertOutcome>
where
    A: ActiveModelTrait + Clone + Send,
    A::Entity: DedupeKey,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    if models.is_empty() {
        return Ok(InsertOutcome::default());
    }

    let mut backoff_ms = initial_backoff_ms;
    let mut attempt = 0;
    loop {
        match insert_deduped(db, models.clone()).await {
            Ok(outcome) => return Ok(outcome),
            Err(e) if is_retryable_error(&e) && attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries,
                    backoff_ms,
                    error = %e,
                    "Insert failed, retrying"
                );
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms = backoff_ms.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Row type the sync persist task can flush in deduped batches.
#[async_trait]
pub trait ImportRow: Clone + Send + Sync + 'static {
    async fn insert_batch(
        db: &DatabaseConnection,
        rows: Vec<Self>,
        max_retries: u32,
        initial_backoff_ms: u64,
    ) -> Result<InsertOutcome>;
}

#[async_trait]
impl ImportRow for order::ActiveModel {
    async fn insert_batch(
        db: &DatabaseConnection,
        rows: Vec<Self>,
        max_retries: u32,
        initial_backoff_ms: u64,
    ) -> Result<InsertOutcome> {
        insert_deduped_with_retry(db, rows, max_retries, initial_backoff_ms).await
    }
}

#[async_trait]
impl ImportRow for product_offer::ActiveModel {
    async fn insert_batch(
        db: &DatabaseConnection,
        rows: Vec<Self>,
        max_retries: u32,
        initial_backoff_ms: u64,
    ) -> Result<InsertOutcome> {
        insert_deduped_with_retry(db, rows, max_retries, initial_backoff_ms).await
    }
}

fn is_retryable_error(err: &RepositoryError) -> bool {
    match err {
        RepositoryError::Database(db_err) => is_retryable_db_error(db_err),
        _ => false,
    }
}

fn is_retryable_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
        }
        _ => false,
    }
}
