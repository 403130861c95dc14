// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Field and form descriptors.
//!
//! A [`FormDescriptor`] is an ordered list of [`FieldDescriptor`]s. Field order
//! is both rendering order and validation order. Each field carries a pure,
//! synchronous validator over the raw submitted string; type conversion and
//! persistence-dependent checks belong to the resource.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::error;

use crate::error::DescriptorError;

/// Raw submitted values keyed by field name.
pub type RawFields = HashMap<String, String>;

/// Pure validator over a raw (trimmed) value.
pub type Validator = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads the current value of a field out of an entity.
pub type Extractor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Resolves the URL a form posts to, for a new (`None`) or existing row.
pub type SaveTarget<T> = Arc<dyn Fn(Option<&T>) -> String + Send + Sync>;

/// One option of a select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    /// Text shown to the user.
    pub label: String,
    /// Submitted value.
    pub value: String,
}

impl SelectOption {
    /// Create an option.
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Rendering hint for a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum FieldKind {
    /// Free text input.
    Text,
    /// Email address input.
    Email,
    /// Calendar date input (`YYYY-MM-DD`).
    Date,
    /// One value out of a fixed list.
    Select {
        /// Allowed options in display order.
        options: Vec<SelectOption>,
    },
}

impl FieldKind {
    /// HTML input type for this kind. Selects are not inputs and return `None`.
    pub fn input_type(&self) -> Option<&'static str> {
        match self {
            FieldKind::Text => Some("text"),
            FieldKind::Email => Some("email"),
            FieldKind::Date => Some("date"),
            FieldKind::Select { .. } => None,
        }
    }
}

/// A single validation failure attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The field name as used in submitted form data.
    pub field: String,
    /// User-facing message.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Ordered mapping of field name to message.
///
/// Insertion order follows form order. A field keeps the first message
/// recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(IndexMap<String, String>);

impl FieldErrors {
    /// An empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` for `field` unless the field already has one.
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Record a [`FieldError`].
    pub fn push(&mut self, error: FieldError) {
        self.insert(error.field, error.message);
    }

    /// Message recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Whether `field` has a message.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Whether no field has a message.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with a message.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate `(field, message)` pairs in form order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<FieldError> for FieldErrors {
    fn from(error: FieldError) -> Self {
        let mut errors = Self::new();
        errors.push(error);
        errors
    }
}

/// One editable attribute of an entity.
pub struct FieldDescriptor<T> {
    name: String,
    label: String,
    kind: FieldKind,
    placeholder: String,
    required: bool,
    validator: Option<Validator>,
    extract: Extractor<T>,
}

impl<T> Clone for FieldDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            label: self.label.clone(),
            kind: self.kind.clone(),
            placeholder: self.placeholder.clone(),
            required: self.required,
            validator: self.validator.clone(),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl<T> FieldDescriptor<T> {
    fn new<F>(name: &str, label: &str, kind: FieldKind, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
            placeholder: String::new(),
            required: false,
            validator: None,
            extract: Arc::new(extract),
        }
    }

    /// A free text field.
    pub fn text<F>(name: &str, label: &str, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self::new(name, label, FieldKind::Text, extract)
    }

    /// An email field. Values must look like `local@domain`.
    pub fn email<F>(name: &str, label: &str, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self::new(name, label, FieldKind::Email, extract)
    }

    /// A date field (`YYYY-MM-DD`).
    pub fn date<F>(name: &str, label: &str, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self::new(name, label, FieldKind::Date, extract)
    }

    /// A select field restricted to `options`.
    pub fn select<F>(name: &str, label: &str, options: Vec<SelectOption>, extract: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        Self::new(name, label, FieldKind::Select { options }, extract)
    }

    /// Set the placeholder text.
    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attach a custom validator, run after the built-in checks.
    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Field name, the key used in submitted form data.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Rendering hint.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Placeholder text, possibly empty.
    pub fn placeholder_text(&self) -> &str {
        &self.placeholder
    }

    /// Whether an empty value is rejected.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Current value of this field for `row`.
    pub fn extract(&self, row: &T) -> String {
        (self.extract)(row)
    }

    /// Run the pure validator against a raw value.
    ///
    /// Empty optional values are accepted without further checks.
    pub fn validate(&self, raw: &str) -> Option<String> {
        let value = raw.trim();
        if value.is_empty() {
            return self
                .required
                .then(|| format!("{} is required", self.label));
        }

        match &self.kind {
            FieldKind::Email if !is_email(value) => {
                return Some("Invalid email address".to_string());
            }
            FieldKind::Select { options } if !options.iter().any(|o| o.value == value) => {
                return Some(format!("Invalid {}", self.label.to_lowercase()));
            }
            _ => {}
        }

        self.validator.as_ref().and_then(|v| v(value))
    }
}

fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !value.contains(char::is_whitespace)
        }
        _ => false,
    }
}

/// Ordered fields plus the save target resolver.
pub struct FormDescriptor<T> {
    fields: Vec<FieldDescriptor<T>>,
    save_target: SaveTarget<T>,
}

impl<T> fmt::Debug for FormDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormDescriptor")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl<T> FormDescriptor<T> {
    /// Build a form. Field names must be unique and at least one is required.
    pub fn new<S>(fields: Vec<FieldDescriptor<T>>, save_target: S) -> Result<Self, DescriptorError>
    where
        S: Fn(Option<&T>) -> String + Send + Sync + 'static,
    {
        if fields.is_empty() {
            error!("Form descriptor declared without fields");
            return Err(DescriptorError::EmptyForm);
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name()) {
                error!(field = %field.name(), "Form field declared more than once");
                return Err(DescriptorError::DuplicateField {
                    name: field.name().to_string(),
                });
            }
        }

        Ok(Self {
            fields,
            save_target: Arc::new(save_target),
        })
    }

    /// Fields in form order.
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// URL the form posts to.
    pub fn save_target(&self, row: Option<&T>) -> String {
        (self.save_target)(row)
    }

    /// Pick this form's fields out of a submitted mapping.
    ///
    /// Unknown keys are dropped, missing fields become empty strings.
    pub fn collect(&self, source: &HashMap<String, String>) -> RawFields {
        self.fields
            .iter()
            .map(|f| {
                let value = source.get(f.name()).cloned().unwrap_or_default();
                (f.name().to_string(), value)
            })
            .collect()
    }

    /// Run every field validator in form order, collecting all failures.
    pub fn validate(&self, raw: &RawFields) -> FieldErrors {
        let mut errors = FieldErrors::new();
        for field in &self.fields {
            let value = raw.get(field.name()).map(String::as_str).unwrap_or("");
            if let Some(message) = field.validate(value) {
                errors.insert(field.name(), message);
            }
        }
        errors
    }

    /// Current values of every field for `row`.
    pub fn values(&self, row: &T) -> RawFields {
        self.fields
            .iter()
            .map(|f| (f.name().to_string(), f.extract(row)))
            .collect()
    }
}
