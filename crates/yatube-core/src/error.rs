//! Error types of the domain layer.

use thiserror::Error;

/// A request the blog rules do not allow.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity_type} {key} not found")]
    NotFound {
        entity_type: &'static str,
        key: String,
    },

    #[error("Users cannot follow themselves")]
    SelfFollow,
}

impl DomainError {
    pub fn not_found(entity_type: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            key: key.to_string(),
        }
    }
}

/// Storage failures, whatever the backend.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Query execution failed: {0}")]
    Query(String),

    #[error("Record not found")]
    NotFound,

    /// A uniqueness or foreign-key rule rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),
}
