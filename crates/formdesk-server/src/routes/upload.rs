// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! File uploads.

use axum::Json;
use axum::extract::State;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppError;

/// Multipart part holding the file.
pub const FILE_PART: &str = "file";

const MAX_EXTENSION_LEN: usize = 10;

/// Stored upload.
#[derive(Debug, Serialize)]
pub struct Uploaded {
    /// Generated file id.
    pub id: String,
    /// Public URL.
    pub url: String,
}

/// `POST /upload`. Stores the `file` part under a generated name.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::NotAcceptable(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_PART) {
            continue;
        }

        let extension = field.file_name().map(extension).unwrap_or_default();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let id = Uuid::new_v4().to_string();
        let location = format!("{id}{extension}");
        state.disk.put(&location, data).await?;
        info!(location = %location, "File uploaded");

        let uploaded = Uploaded {
            url: state.disk.url(&location),
            id,
        };
        return Ok((StatusCode::CREATED, Json(uploaded)).into_response());
    }

    Err(AppError::BadRequest(format!("missing '{FILE_PART}' part")))
}

/// Lowercased `.ext` of `file_name`, empty when absent or unusual.
fn extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!(".{}", ext.to_ascii_lowercase())
        }
        _ => String::new(),
    }
}
