// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic resource routes.
//!
//! Every [`Resource`] is served by the same handlers, mounted at its
//! collection path:
//!
//! | Method | Path | State |
//! |--------|------|-------|
//! | GET | `/` | index |
//! | GET | `/stream` | streaming index (SSE) |
//! | GET | `/create` | empty form |
//! | GET | `/validate` | validate a new row |
//! | GET | `/{id}` | view |
//! | GET | `/{id}/validate` | validate an existing row |
//! | POST | `/` | create |
//! | POST | `/{id}` | update |

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use formdesk_core::lifecycle::ValidationReport;
use formdesk_core::pagination::PaginationQuery;
use formdesk_core::stream::StreamEvent;
use formdesk_core::{Commit, FieldErrors, Lifecycle, Outcome, PageRequest, Resource};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::AppError;
use crate::htmx::{self, HX_PUSH_URL, HX_REPLACE_URL, HX_TRIGGER, HxRequest};
use crate::render::Templates;

/// State of one resource's routes.
pub struct ResourceState<R: Resource> {
    lifecycle: Arc<Lifecycle<R>>,
    templates: Arc<Templates>,
}

impl<R: Resource> Clone for ResourceState<R> {
    fn clone(&self) -> Self {
        Self {
            lifecycle: Arc::clone(&self.lifecycle),
            templates: Arc::clone(&self.templates),
        }
    }
}

type Shared<R> = State<ResourceState<R>>;

/// Routes for one resource, relative to its collection path.
pub fn routes<R: Resource>(lifecycle: Arc<Lifecycle<R>>, templates: Arc<Templates>) -> Router {
    Router::new()
        .route("/", get(index::<R>).post(create::<R>))
        .route("/stream", get(stream::<R>))
        .route("/create", get(create_form::<R>))
        .route("/validate", get(validate_new::<R>))
        .route("/{id}", get(view::<R>).post(update::<R>))
        .route("/{id}/validate", get(validate_existing::<R>))
        .with_state(ResourceState {
            lifecycle,
            templates,
        })
}

async fn index<R: Resource>(
    State(state): Shared<R>,
    HxRequest(hx): HxRequest,
    headers: HeaderMap,
    Query(query): Query<PaginationQuery>,
) -> Result<Response, AppError> {
    let page = state.lifecycle.index(&query).await?;
    if htmx::wants_json(&headers) {
        return Ok(Json(page).into_response());
    }

    let resource = state.lifecycle.resource();
    let body = state.templates.index(resource, &page)?;
    Ok(Html(state.templates.page(hx, resource.title(), body)?).into_response())
}

async fn stream<R: Resource>(
    State(state): Shared<R>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if !htmx::accepts(&headers, "text/event-stream") {
        return Err(AppError::BadRequest(
            "streaming requires Accept: text/event-stream".to_string(),
        ));
    }

    // Dropping the response body (client gone) cancels the session.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let renderer = state.clone();
    let events = state.lifecycle.stream(cancel).map(move |event| {
        let _guard = &guard;
        Ok::<_, Infallible>(sse_event(&renderer, event))
    });

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn sse_event<R: Resource>(state: &ResourceState<R>, event: StreamEvent<R::Row>) -> Event {
    match event {
        StreamEvent::Rows { rows, .. } => {
            let table = state.lifecycle.resource().table_config();
            match state.templates.rows(table, &rows) {
                Ok(html) => Event::default().event("row").data(html),
                Err(e) => {
                    error!(error = %e, "Failed to render streamed rows");
                    Event::default().event("error").data("Failed to render rows")
                }
            }
        }
        StreamEvent::Failed { message } => Event::default().event("error").data(message),
        StreamEvent::End => Event::default().event("end").data(""),
    }
}

async fn create_form<R: Resource>(
    State(state): Shared<R>,
    HxRequest(hx): HxRequest,
) -> Result<Html<String>, AppError> {
    let resource = state.lifecycle.resource();
    let values = resource.form_config().collect(&HashMap::new());
    let body = state
        .templates
        .form(resource, None, &values, &FieldErrors::new())?;
    Ok(Html(state.templates.page(hx, resource.title(), body)?))
}

async fn validate_new<R: Resource>(
    State(state): Shared<R>,
    Query(fields): Query<HashMap<String, String>>,
) -> Json<ValidationReport> {
    Json(state.lifecycle.validate(None, &fields).await)
}

async fn validate_existing<R: Resource>(
    State(state): Shared<R>,
    Path(id): Path<String>,
    Query(fields): Query<HashMap<String, String>>,
) -> Json<ValidationReport> {
    Json(state.lifecycle.validate(Some(&id), &fields).await)
}

async fn view<R: Resource>(
    State(state): Shared<R>,
    HxRequest(hx): HxRequest,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let row = state.lifecycle.view(&id).await?;
    row_response(&state.templates, &state.lifecycle, hx, &headers, row)
}

/// A single row as JSON or as its edit form.
pub(crate) fn row_response<R: Resource>(
    templates: &Templates,
    lifecycle: &Lifecycle<R>,
    hx: bool,
    headers: &HeaderMap,
    row: R::Row,
) -> Result<Response, AppError> {
    if htmx::wants_json(headers) {
        return Ok(Json(row).into_response());
    }

    let resource = lifecycle.resource();
    let values = resource.form_config().values(&row);
    let body = templates.form(resource, Some(&row), &values, &FieldErrors::new())?;
    Ok(Html(templates.page(hx, resource.title(), body)?).into_response())
}

async fn create<R: Resource>(
    State(state): Shared<R>,
    HxRequest(hx): HxRequest,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let commit = state.lifecycle.create(&fields).await;
    respond(&state, hx, true, commit).await
}

async fn update<R: Resource>(
    State(state): Shared<R>,
    HxRequest(hx): HxRequest,
    Path(id): Path<String>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let commit = state.lifecycle.update(&id, &fields).await?;
    respond(&state, hx, false, commit).await
}

/// Map a commit to a response.
///
/// Success re-renders the index with a toast. Recoverable failures re-render
/// the form with the submitted values and the field messages.
async fn respond<R: Resource>(
    state: &ResourceState<R>,
    hx: bool,
    creating: bool,
    commit: Commit<R::Row>,
) -> Result<Response, AppError> {
    let resource = state.lifecycle.resource();
    let Commit {
        raw,
        outcome,
        notice,
    } = commit;

    let mut headers = HeaderMap::new();
    if let Some(notice) = &notice {
        htmx::insert(&mut headers, HX_TRIGGER, &htmx::toast_trigger(notice));
    }
    let status =
        StatusCode::from_u16(outcome.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let errors = outcome.field_errors();
    let conflict = matches!(outcome, Outcome::Conflict { .. });

    let body = match outcome {
        Outcome::Success { .. } => {
            let page = state.lifecycle.index_page(PageRequest::default()).await?;
            htmx::insert(&mut headers, HX_PUSH_URL, &resource.location(None));
            state.templates.index(resource, &page)?
        }
        Outcome::SystemFailure(e) => return Err(AppError::Storage(e)),
        Outcome::Conflict { row, .. }
        | Outcome::ValidationFailure { row, .. }
        | Outcome::ParsingFailure { row, .. } => {
            if conflict && creating {
                let create_url = format!("{}/create", resource.location(None));
                htmx::insert(&mut headers, HX_REPLACE_URL, &create_url);
            }
            state.templates.form(resource, Some(&row), &raw, &errors)?
        }
    };
    let html = state.templates.page(hx, resource.title(), body)?;
    Ok((status, headers, Html(html)).into_response())
}
