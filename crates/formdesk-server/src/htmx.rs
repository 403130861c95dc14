// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! htmx request detection and navigation headers.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::{ACCEPT, LOCATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use formdesk_core::Notice;
use serde_json::json;

/// Set by htmx on every request it issues.
pub const HX_REQUEST: HeaderName = HeaderName::from_static("hx-request");
/// Client-side events to fire.
pub const HX_TRIGGER: HeaderName = HeaderName::from_static("hx-trigger");
/// Push a URL into the browser history.
pub const HX_PUSH_URL: HeaderName = HeaderName::from_static("hx-push-url");
/// Replace the current URL in the browser history.
pub const HX_REPLACE_URL: HeaderName = HeaderName::from_static("hx-replace-url");
/// Client-side redirect without a full reload.
pub const HX_LOCATION: HeaderName = HeaderName::from_static("hx-location");
/// Swap the response into another element.
pub const HX_RETARGET: HeaderName = HeaderName::from_static("hx-retarget");
/// Override the swap strategy.
pub const HX_RESWAP: HeaderName = HeaderName::from_static("hx-reswap");

/// Element the toast notifications are rendered into.
pub const TOAST_TARGET: &str = "#toast-container";

/// Whether the request was issued by htmx. Such requests get fragments
/// instead of full pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HxRequest(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for HxRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(HxRequest(is_htmx(&parts.headers)))
    }
}

/// Whether `headers` carry `HX-Request: true`.
pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get(HX_REQUEST)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// Whether the client accepts `mime`.
pub fn accepts(headers: &HeaderMap, mime: &str) -> bool {
    headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|part| part.split(';').next().unwrap_or("").trim() == mime)
}

/// Whether the client asked for JSON.
pub fn wants_json(headers: &HeaderMap) -> bool {
    accepts(headers, "application/json")
}

/// `HX-Trigger` payload that shows `notice` as a toast.
pub fn toast_trigger(notice: &Notice) -> String {
    json!({
        "show-toast": {
            "target": TOAST_TARGET,
            "message": notice.message,
            "variant": notice.variant,
        }
    })
    .to_string()
}

/// Insert a header whose value came from application data. Values that are
/// not valid header text are skipped.
pub fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Redirect to `to`: `HX-Location` + 204 for htmx, 302 otherwise.
pub fn redirect(hx: HxRequest, to: &str) -> Response {
    let mut headers = HeaderMap::new();
    if hx.0 {
        insert(&mut headers, HX_LOCATION, to);
        (StatusCode::NO_CONTENT, headers).into_response()
    } else {
        insert(&mut headers, LOCATION, to);
        (StatusCode::FOUND, headers).into_response()
    }
}
