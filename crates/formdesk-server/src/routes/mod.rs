// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP routes.

pub mod login;
pub mod resource;
pub mod upload;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Redirect};
use axum::routing::{get, post};
use axum::{Json, Router};
use formdesk_core::Resource;
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::AppState;
use crate::auth;
use crate::error::{self, AppError};

/// Build the application router.
///
/// Resource screens, `/users/me` and `/upload` require a session. Login,
/// health and uploaded files are public. Error responses from every route
/// are rendered by [`error::render_errors`].
pub fn router(state: AppState) -> Router {
    let templates = Arc::clone(&state.templates);
    let users = resource::routes(Arc::clone(&state.users), Arc::clone(&templates))
        .route("/me", get(login::me).with_state(state.clone()));
    let assignments = resource::routes(Arc::clone(&state.assignments), Arc::clone(&templates));

    let protected = Router::new()
        .nest(&state.users.resource().location(None), users)
        .nest(&state.assignments.resource().location(None), assignments)
        .route("/upload", post(upload::upload).with_state(state.clone()))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_session,
        ));

    let mut router = Router::new()
        .route("/", get(|| async { Redirect::to("/users") }))
        .route("/healthz", get(health))
        .route("/login", get(login::form).post(login::request_link))
        .route("/loginlink", get(login::consume_link))
        .route("/logout", get(login::logout))
        .with_state(state.clone())
        .merge(protected)
        .fallback(not_found);

    if state.settings.upload_base_url.starts_with('/') {
        router = router.nest_service(
            &state.settings.upload_base_url,
            ServeDir::new(&state.settings.upload_dir),
        );
    }

    router
        .layer(middleware::from_fn_with_state(templates, error::render_errors))
        .layer(TraceLayer::new_for_http())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.persistence.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unavailable"})),
            )
        }
    }
}

async fn not_found() -> AppError {
    AppError::NotFound("This page".to_string())
}
