// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request lifecycle engine.
//!
//! [`Lifecycle`] drives a [`Resource`] through the index, view, validate,
//! create, update and streaming states. Every commit ends in exactly one
//! [`Outcome`]; failures that are not data problems surface as
//! [`LifecycleError`] (malformed input, missing rows) or
//! [`Outcome::SystemFailure`].
//!
//! ## Commit classification
//!
//! A parsed row is judged in this order:
//!
//! 1. storage failure during parsing → `SystemFailure`
//! 2. conversion failure → `ParsingFailure` (single message)
//! 3. validator or business rule failures → `ValidationFailure` (all messages)
//! 4. uniqueness conflict alone → `Conflict`
//! 5. otherwise the row is persisted; a conflict raised by the store is
//!    still reported as `Conflict`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::entity::{Entity, EntityId};
use crate::error::ResourceError;
use crate::form::{FieldError, FieldErrors, RawFields};
use crate::pagination::{PageRequest, PaginationError, PaginationQuery};
use crate::resource::{ParsedRow, Resource, RowError};
use crate::stream::{StreamConfig, StreamEvent, stream_pages};

/// Default latency budget for fetching an index page.
pub const DEFAULT_INDEX_BUDGET: Duration = Duration::from_millis(20);

/// Lifecycle engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// How long the index waits for `fetch_page` before rendering no rows.
    pub index_budget: Duration,
    /// Streaming index settings.
    pub stream: StreamConfig,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            index_budget: DEFAULT_INDEX_BUDGET,
            stream: StreamConfig::default(),
        }
    }
}

/// Terminal failures outside the commit outcomes.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Malformed client input (pagination, id).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested row does not exist.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Resource title.
        resource: String,
        /// Requested identity.
        id: EntityId,
    },

    /// Storage unavailable or unexpected fault.
    #[error(transparent)]
    System(#[from] ResourceError),
}

impl From<PaginationError> for LifecycleError {
    fn from(e: PaginationError) -> Self {
        LifecycleError::BadRequest(e.to_string())
    }
}

/// Classified result of a create or update commit.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The row was persisted.
    Success {
        /// The persisted row, with its identity set.
        row: T,
        /// The row identity.
        id: EntityId,
    },
    /// One or more fields violate a rule.
    ValidationFailure {
        /// Best-effort row for re-rendering.
        row: T,
        /// Every failing field, in form order.
        errors: FieldErrors,
    },
    /// A value could not be converted.
    ParsingFailure {
        /// Best-effort row for re-rendering.
        row: T,
        /// The failing field.
        error: FieldError,
    },
    /// A unique value is already taken.
    Conflict {
        /// Best-effort row for re-rendering.
        row: T,
        /// The conflicting field.
        error: FieldError,
    },
    /// Storage unavailable or unexpected fault.
    SystemFailure(ResourceError),
}

impl<T> Outcome<T> {
    /// Conventional HTTP status code for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Success { .. } | Outcome::Conflict { .. } => 200,
            Outcome::ParsingFailure { .. } => 400,
            Outcome::ValidationFailure { .. } => 422,
            Outcome::SystemFailure(_) => 500,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success { .. } => "success",
            Outcome::ValidationFailure { .. } => "validation_failure",
            Outcome::ParsingFailure { .. } => "parsing_failure",
            Outcome::Conflict { .. } => "conflict",
            Outcome::SystemFailure(_) => "system_failure",
        }
    }

    /// The row, unless this is a system failure.
    pub fn row(&self) -> Option<&T> {
        match self {
            Outcome::Success { row, .. }
            | Outcome::ValidationFailure { row, .. }
            | Outcome::ParsingFailure { row, .. }
            | Outcome::Conflict { row, .. } => Some(row),
            Outcome::SystemFailure(_) => None,
        }
    }

    /// Field messages to show next to the form inputs.
    pub fn field_errors(&self) -> FieldErrors {
        match self {
            Outcome::ValidationFailure { errors, .. } => errors.clone(),
            Outcome::ParsingFailure { error, .. } | Outcome::Conflict { error, .. } => {
                FieldErrors::from(error.clone())
            }
            Outcome::Success { .. } | Outcome::SystemFailure(_) => FieldErrors::new(),
        }
    }
}

/// Visual style of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeVariant {
    /// The action succeeded.
    Success,
    /// The action failed.
    Error,
}

/// Transient notification shown after a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    /// Message text.
    pub message: String,
    /// Visual style.
    pub variant: NoticeVariant,
}

impl Notice {
    /// A success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: NoticeVariant::Success,
        }
    }

    /// An error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: NoticeVariant::Error,
        }
    }
}

/// Result of a create or update request.
#[derive(Debug)]
pub struct Commit<T> {
    /// Submitted values, used to prefill a re-rendered form.
    pub raw: RawFields,
    /// Classified outcome.
    pub outcome: Outcome<T>,
    /// Notification to show, if any.
    pub notice: Option<Notice>,
}

/// Rows obtained for one index request.
#[derive(Debug, Clone, Serialize)]
pub struct IndexPage<T> {
    /// Zero-based page index.
    pub page: u32,
    /// Requested page size.
    #[serde(rename = "pageSize")]
    pub page_size: u32,
    /// Rows obtained before the deadline.
    pub rows: Vec<T>,
    /// `false` when the latency budget ran out before the store answered.
    pub complete: bool,
}

/// Aggregated result of a validate-only request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Every failing field, in form order. Empty when the input is valid.
    #[serde(rename = "validationErrors")]
    pub errors: FieldErrors,
}

impl ValidationReport {
    /// Whether no field failed.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Create,
    Update,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Action::Create => "created",
            Action::Update => "updated",
        }
    }
}

/// Drives one resource through its request lifecycle.
pub struct Lifecycle<R: Resource> {
    resource: Arc<R>,
    config: LifecycleConfig,
}

impl<R: Resource> Lifecycle<R> {
    /// Engine with default settings.
    pub fn new(resource: R) -> Self {
        Self::with_config(resource, LifecycleConfig::default())
    }

    /// Engine with explicit settings.
    pub fn with_config(resource: R, config: LifecycleConfig) -> Self {
        Self {
            resource: Arc::new(resource),
            config,
        }
    }

    /// The driven resource.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Engine settings.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Index state from raw query parameters.
    pub async fn index(
        &self,
        query: &PaginationQuery,
    ) -> Result<IndexPage<R::Row>, LifecycleError> {
        let page = PageRequest::from_query(query).inspect_err(|e| {
            info!(resource = %self.resource.title(), error = %e, "Rejected pagination parameters");
        })?;
        self.index_page(page).await
    }

    /// Index state for a validated page.
    ///
    /// When the store does not answer within the index budget the page is
    /// returned empty and marked incomplete. Storage errors are terminal.
    pub async fn index_page(&self, page: PageRequest) -> Result<IndexPage<R::Row>, LifecycleError> {
        let fetch = self.resource.fetch_page(page);
        let (rows, complete) = match tokio::time::timeout(self.config.index_budget, fetch).await {
            Ok(Ok(rows)) => (rows, true),
            Ok(Err(e)) => {
                error!(resource = %self.resource.title(), page = page.page, error = %e, "Failed to fetch index page");
                return Err(LifecycleError::System(e));
            }
            Err(_) => {
                debug!(
                    resource = %self.resource.title(),
                    page = page.page,
                    budget_ms = self.config.index_budget.as_millis() as u64,
                    "Index budget exceeded, rendering without rows"
                );
                (Vec::new(), false)
            }
        };

        Ok(IndexPage {
            page: page.page,
            page_size: page.page_size,
            rows,
            complete,
        })
    }

    /// View state.
    pub async fn view(&self, raw_id: &str) -> Result<R::Row, LifecycleError> {
        self.fetch(parse_id(raw_id)?).await
    }

    async fn fetch(&self, id: EntityId) -> Result<R::Row, LifecycleError> {
        self.resource.fetch_row(id).await.map_err(|e| match e {
            ResourceError::NotFound { id, .. } => LifecycleError::NotFound {
                resource: self.resource.title().to_string(),
                id,
            },
            other => {
                error!(resource = %self.resource.title(), id, error = %other, "Failed to fetch row");
                LifecycleError::System(other)
            }
        })
    }

    /// Validate-only state. Never fails: every problem becomes a field
    /// message, and storage faults during validation are logged and skipped.
    ///
    /// A malformed `raw_id` is validated as a new row.
    pub async fn validate(
        &self,
        raw_id: Option<&str>,
        source: &HashMap<String, String>,
    ) -> ValidationReport {
        let id = raw_id.and_then(|raw| parse_id(raw).ok());
        let raw = self.resource.form_config().collect(source);
        let parsed = self.resource.parse_row(id, &raw).await;

        if let Some(e) = parsed.system_error() {
            error!(resource = %self.resource.title(), error = %e, "Storage failure during validation");
        }

        ValidationReport {
            errors: parsed.all_errors(),
        }
    }

    /// Create commit.
    pub async fn create(&self, source: &HashMap<String, String>) -> Commit<R::Row> {
        let raw = self.resource.form_config().collect(source);
        let parsed = self.resource.parse_row(None, &raw).await;

        let outcome = match judge(parsed) {
            Err(outcome) => outcome,
            Ok(row) => match self.resource.create_row(&row).await {
                Ok(id) => Outcome::Success {
                    row: row.with_id(id),
                    id,
                },
                Err(ResourceError::Conflict { field, message }) => Outcome::Conflict {
                    row,
                    error: FieldError::new(field, message),
                },
                Err(e) => Outcome::SystemFailure(e),
            },
        };

        self.finish(Action::Create, raw, outcome)
    }

    /// Update commit. Fails for a malformed id or a missing row, which is
    /// looked up before any field is parsed.
    pub async fn update(
        &self,
        raw_id: &str,
        source: &HashMap<String, String>,
    ) -> Result<Commit<R::Row>, LifecycleError> {
        let id = parse_id(raw_id)?;
        self.fetch(id).await?;

        let raw = self.resource.form_config().collect(source);
        let parsed = self.resource.parse_row(Some(id), &raw).await;

        let outcome = match judge(parsed) {
            Err(outcome) => outcome,
            Ok(row) => match self.resource.update_row(&row).await {
                Ok(()) => Outcome::Success { row, id },
                Err(ResourceError::Conflict { field, message }) => Outcome::Conflict {
                    row,
                    error: FieldError::new(field, message),
                },
                Err(ResourceError::NotFound { id, .. }) => {
                    info!(resource = %self.resource.title(), id, "Update target no longer exists");
                    return Err(LifecycleError::NotFound {
                        resource: self.resource.title().to_string(),
                        id,
                    });
                }
                Err(e) => Outcome::SystemFailure(e),
            },
        };

        Ok(self.finish(Action::Update, raw, outcome))
    }

    /// Streaming index state.
    pub fn stream(
        &self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = StreamEvent<R::Row>> + Send + 'static {
        stream_pages(Arc::clone(&self.resource), self.config.stream, cancel)
    }

    fn finish(&self, action: Action, raw: RawFields, outcome: Outcome<R::Row>) -> Commit<R::Row> {
        let title = self.resource.title();
        let notice = match &outcome {
            Outcome::Success { id, .. } => {
                info!(resource = %title, id, action = action.as_str(), "Row saved");
                Some(Notice::success(format!(
                    "Successfully {} {}",
                    action.past_tense(),
                    title
                )))
            }
            Outcome::ValidationFailure { errors, .. } => {
                info!(resource = %title, action = action.as_str(), fields = errors.len(), "Validation failed");
                Some(Notice::error("Not all fields are valid"))
            }
            Outcome::ParsingFailure { error, .. } => {
                info!(resource = %title, action = action.as_str(), reason = %error, "Parsing failed");
                None
            }
            Outcome::Conflict { error, .. } => {
                info!(resource = %title, action = action.as_str(), reason = %error, "Conflict");
                None
            }
            Outcome::SystemFailure(e) => {
                error!(resource = %title, action = action.as_str(), error = %e, "System failure");
                None
            }
        };

        Commit {
            raw,
            outcome,
            notice,
        }
    }
}

/// Parse a path id. Only positive integers identify persisted rows.
pub fn parse_id(raw: &str) -> Result<EntityId, LifecycleError> {
    match raw.trim().parse::<EntityId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(LifecycleError::BadRequest(format!("invalid id '{raw}'"))),
    }
}

/// Classify a parsed row. `Ok` carries a clean row ready to persist.
///
/// A storage error wins over everything, then a conversion error. A conflict
/// on an otherwise valid row is recoverable; next to other messages it
/// becomes part of a validation failure.
fn judge<T>(parsed: ParsedRow<T>) -> Result<T, Outcome<T>> {
    let ParsedRow {
        row,
        mut field_errors,
        errors,
    } = parsed;

    let mut parsing = None;
    let mut violations = Vec::new();
    let mut conflicts = Vec::new();
    for error in errors {
        match error {
            RowError::System(e) => return Err(Outcome::SystemFailure(e)),
            RowError::Parsing(e) => {
                parsing.get_or_insert(e);
            }
            RowError::Validation(e) => violations.push(e),
            RowError::Conflict(e) => conflicts.push(e),
        }
    }

    if let Some(error) = parsing {
        return Err(Outcome::ParsingFailure { row, error });
    }
    if field_errors.is_empty() && violations.is_empty() && !conflicts.is_empty() {
        let error = conflicts.remove(0);
        return Err(Outcome::Conflict { row, error });
    }

    for error in violations.into_iter().chain(conflicts) {
        field_errors.push(error);
    }
    if field_errors.is_empty() {
        Ok(row)
    } else {
        Err(Outcome::ValidationFailure {
            row,
            errors: field_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(field_errors: &[(&str, &str)], errors: Vec<RowError>) -> ParsedRow<u8> {
        let mut validator_errors = FieldErrors::new();
        for (field, message) in field_errors {
            validator_errors.insert(*field, *message);
        }
        ParsedRow {
            row: 1,
            field_errors: validator_errors,
            errors,
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert_eq!(parse_id(" 7 ").unwrap(), 7);
        for bad in ["0", "-3", "abc", "", "99999999999"] {
            assert!(
                matches!(parse_id(bad), Err(LifecycleError::BadRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_judge_clean_row() {
        assert_eq!(judge(parsed(&[], vec![])).ok(), Some(1));
    }

    #[test]
    fn test_judge_parsing_wins_over_validators() {
        let outcome = judge(parsed(
            &[("name", "Name is required")],
            vec![RowError::Parsing(FieldError::new("date_of_birth", "Invalid date"))],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 400);
        assert!(matches!(
            outcome,
            Outcome::ParsingFailure { ref error, .. } if error.field == "date_of_birth"
        ));
    }

    #[test]
    fn test_judge_collects_validation_failures() {
        let outcome = judge(parsed(
            &[("name", "Name is required")],
            vec![RowError::Validation(FieldError::new("date_of_birth", "Minimum age is 18"))],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 422);
        let errors = outcome.field_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("date_of_birth"), Some("Minimum age is 18"));
    }

    #[test]
    fn test_judge_validator_errors_alone() {
        let outcome = judge(parsed(&[("name", "Name is required")], vec![])).unwrap_err();
        assert_eq!(outcome.kind(), "validation_failure");
    }

    #[test]
    fn test_judge_conflict_alone_is_recoverable() {
        let outcome = judge(parsed(
            &[],
            vec![RowError::Conflict(FieldError::new("email", "already used"))],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 200);
        assert_eq!(outcome.kind(), "conflict");
        assert_eq!(outcome.field_errors().get("email"), Some("already used"));
    }

    #[test]
    fn test_judge_conflict_with_other_errors_is_validation_failure() {
        let outcome = judge(parsed(
            &[("name", "Name is required")],
            vec![RowError::Conflict(FieldError::new("email", "already used"))],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 422);
        assert_eq!(outcome.field_errors().get("email"), Some("already used"));
    }

    #[test]
    fn test_judge_system_failure() {
        let outcome = judge(parsed(
            &[("name", "Name is required")],
            vec![RowError::System(ResourceError::storage("check")(
                sqlx::Error::PoolTimedOut,
            ))],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 500);
        assert!(outcome.row().is_none());
    }

    #[test]
    fn test_judge_parsing_wins_over_a_later_conflict() {
        let outcome = judge(parsed(
            &[],
            vec![
                RowError::Parsing(FieldError::new("date_of_birth", "Invalid date")),
                RowError::Conflict(FieldError::new("email", "already used")),
            ],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 400);
        assert_eq!(outcome.field_errors().get("email"), None);
    }

    #[test]
    fn test_judge_validation_failure_keeps_every_row_error() {
        let outcome = judge(parsed(
            &[],
            vec![
                RowError::Validation(FieldError::new("date_of_birth", "Minimum age is 18")),
                RowError::Conflict(FieldError::new("email", "already used")),
            ],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 422);
        let errors = outcome.field_errors();
        assert_eq!(errors.get("date_of_birth"), Some("Minimum age is 18"));
        assert_eq!(errors.get("email"), Some("already used"));
    }

    #[test]
    fn test_judge_storage_error_wins_wherever_it_appears() {
        let outcome = judge(parsed(
            &[],
            vec![
                RowError::Parsing(FieldError::new("date_of_birth", "Invalid date")),
                RowError::System(ResourceError::storage("check")(
                    sqlx::Error::PoolTimedOut,
                )),
            ],
        ))
        .unwrap_err();
        assert_eq!(outcome.status_code(), 500);
    }

    #[test]
    fn test_validation_report_serialization() {
        let mut errors = FieldErrors::new();
        errors.insert("email", "already used");
        let report = ValidationReport { errors };
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"validationErrors": {"email": "already used"}})
        );
        assert_eq!(
            serde_json::to_value(ValidationReport::default()).unwrap(),
            serde_json::json!({"validationErrors": {}})
        );
    }
}
