// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for formdesk-core.
//!
//! [`ResourceError`] is what resources and the persistence layer return.
//! Storage faults are always wrapped with the operation that failed before
//! they leave the persistence layer.

use thiserror::Error;

use crate::entity::EntityId;

/// Result type using [`ResourceError`].
pub type Result<T> = std::result::Result<T, ResourceError>;

/// Errors returned by resource and persistence operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResourceError {
    /// No row with the given identity exists.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of row that was looked up.
        resource: &'static str,
        /// The identity that was not found.
        id: EntityId,
    },

    /// A uniqueness constraint was violated.
    #[error("conflict on '{field}': {message}")]
    Conflict {
        /// The form field holding the conflicting value.
        field: String,
        /// User-facing message.
        message: String,
    },

    /// The storage backend failed or is unreachable.
    #[error("storage error during '{operation}': {source}")]
    Storage {
        /// The operation that failed.
        operation: &'static str,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
}

impl ResourceError {
    /// Build a closure wrapping a driver error with the operation name.
    ///
    /// ```ignore
    /// query.fetch_all(&pool).await.map_err(ResourceError::storage("list_users"))?;
    /// ```
    pub fn storage(operation: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Storage { operation, source }
    }

    /// Conflict on `field` with the standard user-facing message.
    pub fn already_used(field: impl Into<String>) -> Self {
        Self::Conflict {
            field: field.into(),
            message: "already used".to_string(),
        }
    }

    /// Whether this is a [`ResourceError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this is a [`ResourceError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Descriptor misconfiguration detected while a resource is being built.
///
/// These are programming errors: resources are constructed once at startup
/// and a descriptor error aborts it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DescriptorError {
    /// A table descriptor was built without a row URL.
    #[error("table '{table}' has no row url")]
    MissingRowUrl {
        /// Title of the table.
        table: String,
    },

    /// Two fields of a form share the same name.
    #[error("form field '{name}' is declared more than once")]
    DuplicateField {
        /// The duplicated field name.
        name: String,
    },

    /// A form was declared without any fields.
    #[error("form has no fields")]
    EmptyForm,
}
