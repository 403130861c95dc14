// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP error responses.
//!
//! [`AppError`] only decides the status and the [`ErrorPage`] to show. The
//! [`render_errors`] middleware turns that page into HTML, as a fragment for
//! htmx and inside the layout for plain browser requests.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use formdesk_core::ResourceError;
use formdesk_core::lifecycle::LifecycleError;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::disk::DiskError;
use crate::htmx;
use crate::render::{ErrorPage, Templates};

/// Errors returned by handlers.
///
/// 4xx variants carry a short user-facing message. Internal variants render
/// a generic failure page; their details only reach the log.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed client input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request body has an unsupported content type.
    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] ResourceError),

    /// Upload disk failure.
    #[error(transparent)]
    Disk(#[from] DiskError),

    /// Token signing failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Template rendering failure.
    #[error("failed to render template: {0}")]
    Render(#[from] minijinja::Error),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Storage(_) | Self::Disk(_) | Self::Auth(_) | Self::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The page shown for this error.
    pub fn page(&self) -> ErrorPage {
        match self {
            Self::BadRequest(message) | Self::NotAcceptable(message) => {
                ErrorPage::BadRequest(message.clone())
            }
            Self::NotFound(what) => ErrorPage::NotFound(what.clone()),
            Self::Storage(_) | Self::Disk(_) | Self::Auth(_) | Self::Render(_) => ErrorPage::Failure,
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::BadRequest(message) => AppError::BadRequest(message),
            LifecycleError::NotFound { resource, id } => {
                AppError::NotFound(format!("{resource} {id}"))
            }
            LifecycleError::System(e) => AppError::Storage(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        let mut response = status.into_response();
        response.extensions_mut().insert(self.page());
        response
    }
}

/// Render the [`ErrorPage`] attached to a response by [`AppError`].
pub async fn render_errors(
    State(templates): State<Arc<Templates>>,
    request: Request,
    next: Next,
) -> Response {
    let hx = htmx::is_htmx(request.headers());
    let mut response = next.run(request).await;
    let Some(page) = response.extensions_mut().remove::<ErrorPage>() else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    match templates.error_page(hx, &page) {
        Ok(html) => {
            parts.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            Response::from_parts(parts, Body::from(html))
        }
        Err(e) => {
            error!(error = %e, "Failed to render error page");
            Response::from_parts(parts, Body::empty())
        }
    }
}
