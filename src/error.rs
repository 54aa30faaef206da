use uuid::Uuid;

use crate::export::ExportError;

/// Failures surfaced by the engine to the calling service layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid date range: {0}")]
    InvalidRange(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Input or scoping failures the caller should report as a client error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRange(_) | EngineError::Forbidden(_) | EngineError::NotFound { .. }
        )
    }
}

/// Errors raised by the external attendance store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("unexpected value in column {column}: {value}")]
    Decode { column: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_classified() {
        assert!(EngineError::InvalidRange("bad".into()).is_client_error());
        assert!(EngineError::Forbidden("no".into()).is_client_error());
        assert!(EngineError::not_found("cohort", Uuid::nil()).is_client_error());
        let decode = StoreError::Decode {
            column: "cohorts.status",
            value: "ARCHIVED".into(),
        };
        assert!(!EngineError::from(decode).is_client_error());
    }

    #[test]
    fn not_found_names_the_entity() {
        let err = EngineError::not_found("learner", Uuid::nil());
        assert_eq!(
            err.to_string(),
            "learner 00000000-0000-0000-0000-000000000000 not found"
        );
    }
}
