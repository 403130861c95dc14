// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The resource contract.
//!
//! A [`Resource`] binds one row type to its storage operations and its
//! presentation descriptors. One instance per row type is built at startup
//! and shared read-only across requests (`Arc<R>`); it holds no per-request
//! state.
//!
//! Every async method may be cancelled by dropping its future. Implementations
//! must not rely on running to completion: the lifecycle engine drops
//! `fetch_page` when the index budget runs out and the streaming driver drops
//! it when the client disconnects.

use async_trait::async_trait;

use crate::entity::{Entity, EntityId};
use crate::error::{ResourceError, Result};
use crate::form::{FieldError, FieldErrors, FormDescriptor, RawFields};
use crate::pagination::PageRequest;
use crate::table::TableDescriptor;

/// An error found while turning raw fields into a row.
#[derive(Debug)]
pub enum RowError {
    /// A value could not be converted (e.g. an unparseable date).
    Parsing(FieldError),
    /// A well-formed value violates a business rule.
    Validation(FieldError),
    /// A unique value is already taken by another row.
    Conflict(FieldError),
    /// A storage lookup needed for validation failed.
    System(ResourceError),
}

impl RowError {
    /// The field this error is attached to. `None` for system errors.
    pub fn field_error(&self) -> Option<&FieldError> {
        match self {
            RowError::Parsing(e) | RowError::Validation(e) | RowError::Conflict(e) => Some(e),
            RowError::System(_) => None,
        }
    }
}

/// Result of [`Resource::parse_row`].
///
/// The row is always returned, even on failure, so forms can be re-rendered
/// pre-filled.
#[derive(Debug)]
pub struct ParsedRow<T> {
    /// Best-effort row built from the submitted values.
    pub row: T,
    /// Pure field validator failures, all fields, in form order.
    pub field_errors: FieldErrors,
    /// Conversion, business rule, uniqueness and storage errors, in the
    /// order they were found.
    pub errors: Vec<RowError>,
}

impl<T> ParsedRow<T> {
    /// Validator failures merged with the row errors.
    ///
    /// A validator message for a field takes precedence over a row error on
    /// the same field, and an earlier row error over a later one. System
    /// errors are not field errors and are left out.
    pub fn all_errors(&self) -> FieldErrors {
        let mut errors = self.field_errors.clone();
        for e in self.errors.iter().filter_map(RowError::field_error) {
            errors.push(e.clone());
        }
        errors
    }

    /// The first storage error, if any.
    pub fn system_error(&self) -> Option<&ResourceError> {
        self.errors.iter().find_map(|e| match e {
            RowError::System(e) => Some(e),
            _ => None,
        })
    }

    /// Whether neither validators nor the row parser reported anything.
    pub fn is_clean(&self) -> bool {
        self.field_errors.is_empty() && self.errors.is_empty()
    }
}

/// Uniform operations over one row type.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// The row type.
    type Row: Entity;

    /// Stable display name (e.g. "Users").
    fn title(&self) -> &str;

    /// Up to `page.page_size` rows starting at `page.offset()`, in a stable
    /// order.
    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<Self::Row>>;

    /// A single row. Fails with [`ResourceError::NotFound`] when absent.
    async fn fetch_row(&self, id: EntityId) -> Result<Self::Row>;

    /// Convert raw fields into a row and run the checks that pure field
    /// validators cannot express: type conversion, business rules and
    /// persistence-dependent checks such as uniqueness.
    ///
    /// Returns the best-effort row and every error found. Checks on
    /// independent fields all run, so one bad field does not hide another.
    async fn parse_fields(
        &self,
        id: Option<EntityId>,
        raw: &RawFields,
    ) -> (Self::Row, Vec<RowError>);

    /// Run every field validator and [`Resource::parse_fields`].
    async fn parse_row(&self, id: Option<EntityId>, raw: &RawFields) -> ParsedRow<Self::Row> {
        let field_errors = self.form_config().validate(raw);
        let (row, errors) = self.parse_fields(id, raw).await;
        ParsedRow {
            row,
            field_errors,
            errors,
        }
    }

    /// Persist a new row and return its assigned identity.
    ///
    /// Fails with [`ResourceError::Conflict`] on a uniqueness violation.
    async fn create_row(&self, row: &Self::Row) -> Result<EntityId>;

    /// Persist changes to an existing row.
    ///
    /// Fails with [`ResourceError::Conflict`] on a uniqueness violation and
    /// with [`ResourceError::NotFound`] when the row no longer exists.
    async fn update_row(&self, row: &Self::Row) -> Result<()>;

    /// Index view columns and links.
    fn table_config(&self) -> &TableDescriptor<Self::Row>;

    /// Create/edit form fields.
    fn form_config(&self) -> &FormDescriptor<Self::Row>;

    /// Collection path for `None`, row path otherwise.
    fn location(&self, row: Option<&Self::Row>) -> String;
}
