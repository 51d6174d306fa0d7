use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by order, offer and saved-calculation storage.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Record not found: {context}")]
    NotFound { context: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Stored JSON no longer matches the expected shape.
    #[error("Corrupt record {context}: {message}")]
    Corrupt { context: String, message: String },
}

impl RepositoryError {
    pub fn not_found_by_id(id: Uuid) -> Self {
        Self::NotFound {
            context: format!("id={}", id),
        }
    }

    pub fn not_found_by_emag_id(integration_id: Uuid, emag_id: i64) -> Self {
        Self::NotFound {
            context: format!("integration={} emag_id={}", integration_id, emag_id),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
