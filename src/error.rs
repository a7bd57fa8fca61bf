use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

/// Errors surfaced by the questionnaire operations.
///
/// Duplication either yields a complete new tree or nothing at all: any
/// storage failure mid-clone arrives here as `Database` only after the
/// whole transaction has rolled back.
#[derive(Error, Debug)]
pub enum QuestionnaireError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// The derived (title, version) already exists. Carries the colliding
    /// questionnaire's id so the caller can offer it instead.
    #[error("Questionnaire title already in use: {title}")]
    Conflict { title: String, existing_id: Uuid },

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl QuestionnaireError {
    pub(crate) fn not_found(entity: &'static str, id: &Uuid) -> Self {
        QuestionnaireError::NotFound { entity, id: *id }
    }

    pub(crate) fn validation(field: &str, reason: &str) -> Self {
        QuestionnaireError::Validation {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
