//! Mutation store errors

use thiserror::Error;

use crate::domain::{EntityId, EntityKind, HierarchyError, IdError};

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("{kind} referenced but not found: {id}")]
    MissingReference { kind: EntityKind, id: EntityId },

    #[error("{kind} ID already exists: {id}")]
    DuplicateId { kind: EntityKind, id: EntityId },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    InvalidId(#[from] IdError),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

impl StoreError {
    pub(crate) fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        StoreError::NotFound {
            kind,
            id: id.clone(),
        }
    }

    pub(crate) fn missing(kind: EntityKind, id: &EntityId) -> Self {
        StoreError::MissingReference {
            kind,
            id: id.clone(),
        }
    }

    /// Returns true for failures caused by a rejected parent link
    pub fn is_hierarchy(&self) -> bool {
        matches!(self, StoreError::Hierarchy(_))
    }
}

/// Rejects blank required text, returning it trimmed
pub(crate) fn required_text(field: &'static str, value: &str) -> Result<String, StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Invalid {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
