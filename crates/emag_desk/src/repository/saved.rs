use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entity::saved_calculation::{self, ActiveModel, Entity as SavedCalculation, Model};

use super::errors::{RepositoryError, Result};

/// Store `input` under `name`, replacing the input of an existing entry with
/// the same name.
pub async fn save_calculation(
    db: &DatabaseConnection,
    name: &str,
    input: serde_json::Value,
) -> Result<Model> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RepositoryError::invalid_input("calculation name is empty"));
    }

    let now = Utc::now().fixed_offset();
    match find_calculation_by_name(db, name).await? {
        Some(existing) => {
            let mut active: ActiveModel = existing.into();
            active.input = Set(input);
            active.updated_at = Set(now);
            Ok(active.update(db).await?)
        }
        None => {
            let active = ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(name.to_string()),
                input: Set(input),
                created_at: Set(now),
                updated_at: Set(now),
            };
            Ok(active.insert(db).await?)
        }
    }
}

pub async fn find_calculation(db: &DatabaseConnection, id: Uuid) -> Result<Model> {
    SavedCalculation::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found_by_id(id))
}

pub async fn find_calculation_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<Model>> {
    Ok(SavedCalculation::find()
        .filter(saved_calculation::Column::Name.eq(name))
        .one(db)
        .await?)
}

/// All saved calculations, most recently updated first.
pub async fn list_calculations(db: &DatabaseConnection) -> Result<Vec<Model>> {
    Ok(SavedCalculation::find()
        .order_by_desc(saved_calculation::Column::UpdatedAt)
        .all(db)
        .await?)
}

/// Returns whether a row was removed.
pub async fn delete_calculation(db: &DatabaseConnection, id: Uuid) -> Result<bool> {
    let result = SavedCalculation::delete_by_id(id).exec(db).await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;

    fn model(name: &str) -> Model {
        let now = Utc::now().fixed_offset();
        Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            input: serde_json::json!({"vat_rate_percent": "21"}),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_rejects_blank_name() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let err = save_calculation(&db, "   ", serde_json::json!({}))
            .await
            .expect_err("blank name should fail");
        assert!(matches!(err, RepositoryError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn save_inserts_when_name_is_new() {
        let inserted = model("espressor");
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<Model>::new()])
            .append_query_results([vec![inserted.clone()]])
            .append_exec_results([MockExecResult {
                rows_affected: 1,
                last_insert_id: 0,
            }])
            .into_connection();

        let saved = save_calculation(&db, "espressor", inserted.input.clone())
            .await
            .expect("insert should succeed");
        assert_eq!(saved.name, "espressor");
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([
                MockExecResult {
                    rows_affected: 1,
                    last_insert_id: 0,
                },
                MockExecResult {
                    rows_affected: 0,
                    last_insert_id: 0,
                },
            ])
            .into_connection();

        assert!(delete_calculation(&db, Uuid::new_v4()).await.unwrap());
        assert!(!delete_calculation(&db, Uuid::new_v4()).await.unwrap());
    }
}
