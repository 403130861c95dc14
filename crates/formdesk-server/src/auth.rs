// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Signed session and login-link tokens.
//!
//! Two token audiences are issued, both HS256 JWTs with issuer `formdesk`:
//!
//! | Audience | Lifetime | Carried in |
//! |----------|----------|------------|
//! | `loginlink` | 5 minutes | the emailed login URL |
//! | `formdesk` | 1 hour | the `formdesk_auth` cookie |
//!
//! The subject is the user id.

use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use chrono::Utc;
use formdesk_core::EntityId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::htmx::{self, HX_RESWAP, HX_RETARGET};

/// Token issuer.
pub const ISSUER: &str = "formdesk";
/// Audience of session tokens.
pub const SESSION_AUDIENCE: &str = "formdesk";
/// Audience of login-link tokens.
pub const LOGIN_LINK_AUDIENCE: &str = "loginlink";
/// Session cookie name.
pub const SESSION_COOKIE: &str = "formdesk_auth";

/// Session token lifetime.
pub const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
/// Login-link token lifetime.
pub const LOGIN_LINK_TTL: Duration = Duration::from_secs(5 * 60);
/// Session cookie lifetime. Longer than the token so an expired session can
/// prefill the login form.
pub const COOKIE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const LEEWAY_SECS: u64 = 10;

/// Token errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token was valid but has expired.
    #[error("token expired")]
    Expired,

    /// The token is malformed, forged or meant for another audience.
    #[error("invalid token: {0}")]
    Invalid(String),

    /// The token could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// JWT claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Audience.
    pub aud: String,
    /// Issuer.
    pub iss: String,
    /// Issued at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl Claims {
    /// The user id carried in the subject.
    pub fn user_id(&self) -> Result<EntityId, AuthError> {
        self.sub
            .parse()
            .map_err(|_| AuthError::Invalid(format!("subject '{}' is not a user id", self.sub)))
    }
}

/// Issues and verifies tokens with a shared secret.
#[derive(Clone)]
pub struct Signer {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").finish_non_exhaustive()
    }
}

impl Signer {
    /// Signer for `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issue a token for `user_id` valid for `ttl`.
    pub fn issue(&self, audience: &str, user_id: EntityId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            aud: audience.to_string(),
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Verify `token` for `audience`.
    pub fn verify(&self, token: &str, audience: &str) -> Result<Claims, AuthError> {
        self.decode(token, audience, true)
    }

    /// Verify `token` for `audience`, accepting an expired one.
    pub fn verify_allow_expired(&self, token: &str, audience: &str) -> Result<Claims, AuthError> {
        self.decode(token, audience, false)
    }

    fn decode(&self, token: &str, audience: &str, validate_exp: bool) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);
        validation.leeway = LEEWAY_SECS;
        validation.validate_exp = validate_exp;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e.to_string()),
            })
    }
}

/// Identity of the logged-in user, inserted by [`require_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    /// User id.
    pub id: EntityId,
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        COOKIE_MAX_AGE.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value removing the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Value of cookie `name` from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Append a `Set-Cookie` header.
pub fn set_cookie(headers: &mut HeaderMap, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        headers.append(SET_COOKIE, value);
    }
}

/// Reject requests without a valid session.
///
/// htmx requests get 422 with the session-expired fragment retargeted to
/// `#relogin`; other requests are redirected to `/login`.
pub async fn require_session(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let headers = request.headers();
    let hx = htmx::is_htmx(headers);

    let verified = match cookie_value(headers, SESSION_COOKIE) {
        Some(token) => state
            .signer
            .verify(&token, SESSION_AUDIENCE)
            .and_then(|claims| claims.user_id()),
        None => Err(AuthError::Invalid("no session cookie".to_string())),
    };

    match verified {
        Ok(id) => {
            request.extensions_mut().insert(CurrentUser { id });
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "Rejected request without a valid session");
            if hx {
                session_expired(&state).unwrap_or_else(IntoResponse::into_response)
            } else {
                htmx::redirect(htmx::HxRequest(false), "/login")
            }
        }
    }
}

fn session_expired(state: &AppState) -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(HX_RETARGET, HeaderValue::from_static("#relogin"));
    headers.insert(HX_RESWAP, HeaderValue::from_static("innerHTML show:top"));
    let body = state.templates.session_expired()?;
    Ok((StatusCode::UNPROCESSABLE_ENTITY, headers, Html(body)).into_response())
}
