// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Table descriptors.
//!
//! A [`TableDescriptor`] lists the columns of an index view and the links it
//! needs. The row link is mandatory; building a table without one is a
//! programming error and fails at construction rather than at render time.

use std::fmt;
use std::sync::Arc;

use tracing::error;

use crate::error::DescriptorError;

type ValueOf<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// A labelled column with its value extractor.
pub struct Column<T> {
    label: String,
    value_of: ValueOf<T>,
}

impl<T> Column<T> {
    /// Column header.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Cell value for `row`.
    pub fn value_of(&self, row: &T) -> String {
        (self.value_of)(row)
    }
}

impl<T> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Columns and links of an index view.
pub struct TableDescriptor<T> {
    title: String,
    create_label: String,
    create_url: String,
    row_url: ValueOf<T>,
    stream_url: Option<String>,
    columns: Vec<Column<T>>,
}

impl<T> fmt::Debug for TableDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableDescriptor")
            .field("title", &self.title)
            .field("create_url", &self.create_url)
            .field("stream_url", &self.stream_url)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl<T> TableDescriptor<T> {
    /// Start building a table with the given title.
    pub fn builder(title: impl Into<String>) -> TableBuilder<T> {
        TableBuilder {
            title: title.into(),
            create_label: String::new(),
            create_url: String::new(),
            row_url: None,
            stream_url: None,
            columns: Vec::new(),
        }
    }

    /// Table title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Label of the "create" action.
    pub fn create_label(&self) -> &str {
        &self.create_label
    }

    /// URL of the empty create form.
    pub fn create_url(&self) -> &str {
        &self.create_url
    }

    /// URL of the page showing `row`.
    pub fn row_url(&self, row: &T) -> String {
        (self.row_url)(row)
    }

    /// URL of the streaming index, when the resource supports it.
    pub fn stream_url(&self) -> Option<&str> {
        self.stream_url.as_deref()
    }

    /// Columns in display order.
    pub fn columns(&self) -> &[Column<T>] {
        &self.columns
    }

    /// Cell values of `row` in column order.
    pub fn cells(&self, row: &T) -> Vec<String> {
        self.columns.iter().map(|c| c.value_of(row)).collect()
    }
}

/// Builder for [`TableDescriptor`].
pub struct TableBuilder<T> {
    title: String,
    create_label: String,
    create_url: String,
    row_url: Option<ValueOf<T>>,
    stream_url: Option<String>,
    columns: Vec<Column<T>>,
}

impl<T> TableBuilder<T> {
    /// Set the row link resolver.
    pub fn row_url<F>(mut self, row_url: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.row_url = Some(Arc::new(row_url));
        self
    }

    /// Set the create action label and URL.
    pub fn create(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.create_label = label.into();
        self.create_url = url.into();
        self
    }

    /// Enable the streaming index at `url`.
    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    /// Append a column.
    pub fn column<F>(mut self, label: impl Into<String>, value_of: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.columns.push(Column {
            label: label.into(),
            value_of: Arc::new(value_of),
        });
        self
    }

    /// Finish the table.
    pub fn build(self) -> Result<TableDescriptor<T>, DescriptorError> {
        let Some(row_url) = self.row_url else {
            error!(table = %self.title, "Table descriptor built without a row url");
            return Err(DescriptorError::MissingRowUrl { table: self.title });
        };

        Ok(TableDescriptor {
            title: self.title,
            create_label: self.create_label,
            create_url: self.create_url,
            row_url,
            stream_url: self.stream_url,
            columns: self.columns,
        })
    }
}
