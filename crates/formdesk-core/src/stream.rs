// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Paced streaming of successive pages.
//!
//! The streaming index fetches fixed-size pages one after another and emits
//! each as a separate event. Between pages it waits out the remainder of a
//! minimum frame interval so a fast store cannot flood the transport.
//!
//! ```text
//!   page 0 ──► Rows ──► (sleep rest of frame) ──► page 1 ──► Rows ──► ...
//!                                                                │
//!        short page / max pages reached ──► End                  │
//!        store error ──────────────────────► Failed              │
//!        cancelled ────────────────────────► (nothing) ◄─────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::Stream;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::pagination::{PageRequest, STREAM_PAGE_SIZE};
use crate::resource::Resource;

/// Default cap on pages per stream session.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Default minimum interval between two frames.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Streaming driver settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Rows per page.
    pub page_size: u32,
    /// Maximum number of pages fetched per session.
    pub max_pages: u32,
    /// Minimum wall-clock time per frame.
    pub frame_interval: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            page_size: STREAM_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

/// One event of a streaming index session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamEvent<T> {
    /// A non-empty page of rows.
    Rows {
        /// Zero-based page index.
        page: u32,
        /// Rows of the page.
        rows: Vec<T>,
    },
    /// The store failed; the session ends without an `End` event.
    Failed {
        /// Generic user-facing message.
        message: String,
    },
    /// Terminal event: no more pages will follow.
    End,
}

/// Stream pages of `resource` until the data runs out, the page cap is hit,
/// the store fails or `cancel` fires.
///
/// Once `cancel` fires no further event is produced, `End` included.
pub fn stream_pages<R: Resource>(
    resource: Arc<R>,
    config: StreamConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent<R::Row>> + Send + 'static {
    stream! {
        let mut page = PageRequest::first(config.page_size);

        for _ in 0..config.max_pages {
            let started = Instant::now();

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(resource = %resource.title(), page = page.page, "Stream cancelled");
                    return;
                }
                result = resource.fetch_page(page) => result,
            };

            let rows = match fetched {
                Ok(rows) => rows,
                Err(e) => {
                    error!(resource = %resource.title(), page = page.page, error = %e, "Failed to fetch stream page");
                    yield StreamEvent::Failed { message: "Failed to load rows".to_string() };
                    return;
                }
            };

            let count = rows.len();
            if count > 0 {
                yield StreamEvent::Rows { page: page.page, rows };
            }
            if count < page.page_size as usize {
                break;
            }
            page = page.next();

            if let Some(rest) = config.frame_interval.checked_sub(started.elapsed()) {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(resource = %resource.title(), page = page.page, "Stream cancelled");
                        return;
                    }
                    _ = tokio::time::sleep(rest) => {}
                }
            }
        }

        if !cancel.is_cancelled() {
            yield StreamEvent::End;
        }
    }
}
