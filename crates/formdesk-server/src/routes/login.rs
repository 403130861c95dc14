// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Passwordless login.
//!
//! `POST /login` mails a short-lived link; `GET /loginlink` exchanges it for
//! a session cookie.

use axum::extract::{Extension, Form, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::AppState;
use crate::auth::{
    self, CurrentUser, LOGIN_LINK_AUDIENCE, LOGIN_LINK_TTL, SESSION_AUDIENCE, SESSION_COOKIE,
    SESSION_TTL,
};
use crate::error::AppError;
use crate::htmx::{self, HxRequest};
use crate::mail;
use crate::routes::resource::row_response;

const LOGIN_TITLE: &str = "Log in";

/// Login form submission.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: Option<String>,
}

/// Login link query.
#[derive(Debug, Deserialize)]
pub struct LinkQuery {
    #[serde(default)]
    token: Option<String>,
}

/// `GET /login`. Prefilled with the email of an expired session.
pub async fn form(
    State(state): State<AppState>,
    HxRequest(hx): HxRequest,
    headers: HeaderMap,
) -> Result<Html<String>, AppError> {
    let email = match previous_user(&state, &headers) {
        Some(id) => match state.persistence.get_user(id).await {
            Ok(user) => user.map(|u| u.email).unwrap_or_default(),
            Err(e) => {
                warn!(user_id = id, error = %e, "Failed to prefill login form");
                String::new()
            }
        },
        None => String::new(),
    };
    let body = state.templates.login(&email, None)?;
    Ok(Html(state.templates.page(hx, LOGIN_TITLE, body)?))
}

fn previous_user(state: &AppState, headers: &HeaderMap) -> Option<formdesk_core::EntityId> {
    let token = auth::cookie_value(headers, SESSION_COOKIE)?;
    state
        .signer
        .verify_allow_expired(&token, SESSION_AUDIENCE)
        .and_then(|claims| claims.user_id())
        .ok()
}

/// `POST /login`. Unknown emails get the same answer as known ones.
pub async fn request_link(
    State(state): State<AppState>,
    HxRequest(hx): HxRequest,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let email = form.email.as_deref().map(str::trim).unwrap_or("");
    if email.is_empty() {
        let body = state.templates.login("", Some("Email is required"))?;
        return Ok((
            StatusCode::BAD_REQUEST,
            Html(state.templates.page(hx, LOGIN_TITLE, body)?),
        )
            .into_response());
    }

    match state.persistence.get_user_by_email(email).await? {
        Some(user) => {
            let token = state
                .signer
                .issue(LOGIN_LINK_AUDIENCE, user.id, LOGIN_LINK_TTL)?;
            let link = format!("{}/loginlink?token={}", state.settings.public_url, token);
            let email = mail::login_email(&state.templates, &user, &link)?;
            match state.mailer.send(email).await {
                Ok(()) => info!(user_id = user.id, "Login link sent"),
                Err(e) => error!(user_id = user.id, error = %e, "Failed to send login link"),
            }
        }
        None => info!("Login link requested for an unknown email"),
    }

    let body = state.templates.check_inbox(email)?;
    Ok(Html(state.templates.page(hx, LOGIN_TITLE, body)?).into_response())
}

/// `GET /loginlink?token=`. Sets the session cookie and redirects to the
/// users list; any invalid link redirects back to the login form.
pub async fn consume_link(
    State(state): State<AppState>,
    hx: HxRequest,
    Query(query): Query<LinkQuery>,
) -> Result<Response, AppError> {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Ok(htmx::redirect(hx, "/login"));
    };

    let id = match state
        .signer
        .verify(&token, LOGIN_LINK_AUDIENCE)
        .and_then(|claims| claims.user_id())
    {
        Ok(id) => id,
        Err(e) => {
            info!(error = %e, "Rejected login link");
            return Ok(htmx::redirect(hx, "/login"));
        }
    };

    let Some(user) = state.persistence.get_user(id).await? else {
        info!(user_id = id, "Login link for a user that no longer exists");
        return Ok(htmx::redirect(hx, "/login"));
    };

    let session = state.signer.issue(SESSION_AUDIENCE, user.id, SESSION_TTL)?;
    let mut response = htmx::redirect(hx, "/users");
    auth::set_cookie(
        response.headers_mut(),
        &auth::session_cookie(&session, state.settings.secure_cookies),
    );
    info!(user_id = user.id, "User logged in");
    Ok(response)
}

/// `GET /logout`.
pub async fn logout(State(state): State<AppState>, hx: HxRequest) -> Response {
    let mut response = htmx::redirect(hx, "/login");
    auth::set_cookie(
        response.headers_mut(),
        &auth::clear_session_cookie(state.settings.secure_cookies),
    );
    response
}

/// `GET /users/me`. The logged-in user's own row.
pub async fn me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    HxRequest(hx): HxRequest,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let user = state.users.view(&current.id.to_string()).await?;
    row_response(&state.templates, &state.users, hx, &headers, user)
}
