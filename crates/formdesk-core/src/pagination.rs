// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Page window parsing and validation.
//!
//! Page parameters arrive as raw query strings. Malformed values are client
//! errors and are rejected, never clamped.

use serde::Deserialize;
use thiserror::Error;

/// Default page size for the regular index.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Fixed page size for the streaming index.
pub const STREAM_PAGE_SIZE: u32 = 50;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Malformed pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// `page` is not a non-negative integer.
    #[error("invalid page '{0}'")]
    InvalidPage(String),

    /// `pageSize` is not a positive integer.
    #[error("invalid page size '{0}'")]
    InvalidPageSize(String),

    /// `pageSize` exceeds [`MAX_PAGE_SIZE`].
    #[error("page size {0} exceeds the maximum of {MAX_PAGE_SIZE}")]
    PageSizeTooLarge(u32),
}

/// Raw pagination query parameters (`?page=&pageSize=`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationQuery {
    /// Zero-based page index.
    pub page: Option<String>,
    /// Rows per page.
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Rows per page, always greater than zero.
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

impl PageRequest {
    /// A validated window.
    pub fn new(page: u32, page_size: u32) -> Result<Self, PaginationError> {
        if page_size == 0 {
            return Err(PaginationError::InvalidPageSize(page_size.to_string()));
        }
        if page_size > MAX_PAGE_SIZE {
            return Err(PaginationError::PageSizeTooLarge(page_size));
        }
        Ok(Self { page, page_size })
    }

    /// The first page with the given size.
    ///
    /// The size is raised to 1 when zero.
    pub fn first(page_size: u32) -> Self {
        Self {
            page: 0,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Parse raw query values. Absent or empty values take the defaults.
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Result<Self, PaginationError> {
        let page = match page.map(str::trim).filter(|p| !p.is_empty()) {
            None => 0,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| PaginationError::InvalidPage(raw.to_string()))?,
        };

        let page_size = match page_size.map(str::trim).filter(|p| !p.is_empty()) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| PaginationError::InvalidPageSize(raw.to_string()))?,
        };

        Self::new(page, page_size)
    }

    /// Parse a [`PaginationQuery`].
    pub fn from_query(query: &PaginationQuery) -> Result<Self, PaginationError> {
        Self::parse(query.page.as_deref(), query.page_size.as_deref())
    }

    /// Row offset of this page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.page_size)
    }

    /// Row limit of this page.
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// The following page with the same size.
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            page_size: self.page_size,
        }
    }
}
