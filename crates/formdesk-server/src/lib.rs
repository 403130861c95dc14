// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! formdesk HTTP server.
//!
//! Serves the resource screens driven by [`formdesk_core::Lifecycle`] as
//! htmx-friendly HTML (or JSON on request), streams index rows over
//! Server-Sent Events, and handles passwordless login and file uploads.
//!
//! ```text
//!  browser ──HTTP──► axum Router ──► require_session ──► resource routes ──► Lifecycle ──► Persistence
//!                        │                                                          │
//!                        ├── /login, /loginlink ──► Signer, Mailer                  └── SSE stream
//!                        ├── /upload ──► Disk
//!                        └── /storage ──► ServeDir
//! ```
//!
//! Every collaborator is built once in `main` and shared through
//! [`AppState`].

pub mod auth;
pub mod config;
pub mod disk;
pub mod error;
pub mod htmx;
pub mod mail;
pub mod render;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use formdesk_core::persistence::Persistence;
use formdesk_core::resources::{AssignmentResource, UserResource};
use formdesk_core::{DescriptorError, Lifecycle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tracing::info;

use crate::auth::Signer;
use crate::config::Config;
use crate::disk::Disk;
use crate::mail::Mailer;
use crate::render::Templates;

pub use routes::router;

/// Settings the handlers need beyond their collaborators.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL used in login links, without trailing slash.
    pub public_url: String,
    /// Mark cookies `Secure`.
    pub secure_cookies: bool,
    /// Directory served under `upload_base_url`.
    pub upload_dir: PathBuf,
    /// URL prefix of uploaded files.
    pub upload_base_url: String,
}

impl Settings {
    /// Settings derived from `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            public_url: config.public_url.clone(),
            secure_cookies: config.environment.is_production(),
            upload_dir: config.upload_dir.clone(),
            upload_base_url: config.upload_base_url.clone(),
        }
    }
}

/// Failure to assemble [`AppState`].
#[derive(Debug, Error)]
pub enum StateError {
    /// A resource descriptor is misconfigured.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A view template does not parse.
    #[error("invalid template: {0}")]
    Template(#[from] minijinja::Error),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Storage.
    pub persistence: Arc<dyn Persistence>,
    /// Token signer.
    pub signer: Arc<Signer>,
    /// Outgoing mail.
    pub mailer: Arc<dyn Mailer>,
    /// Upload storage.
    pub disk: Arc<dyn Disk>,
    /// Handler settings.
    pub settings: Arc<Settings>,
    /// View templates.
    pub templates: Arc<Templates>,
    /// Users screen.
    pub users: Arc<Lifecycle<UserResource>>,
    /// Assignments screen.
    pub assignments: Arc<Lifecycle<AssignmentResource>>,
}

impl AppState {
    /// Build the resources on top of `persistence`, load the templates and
    /// assemble the state.
    pub fn new(
        config: &Config,
        persistence: Arc<dyn Persistence>,
        mailer: Arc<dyn Mailer>,
        disk: Arc<dyn Disk>,
    ) -> Result<Self, StateError> {
        let lifecycle = config.lifecycle();
        let users = UserResource::new(Arc::clone(&persistence))?;
        let assignments = AssignmentResource::new(Arc::clone(&persistence))?;

        Ok(Self {
            persistence,
            signer: Arc::new(Signer::new(&config.jwt_secret)),
            mailer,
            disk,
            settings: Arc::new(Settings::from_config(config)),
            templates: Arc::new(Templates::new()?),
            users: Arc::new(Lifecycle::with_config(users, lifecycle)),
            assignments: Arc::new(Lifecycle::with_config(assignments, lifecycle)),
        })
    }
}

/// Serve `app` on `listener` until Ctrl-C or SIGTERM.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "formdesk server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("formdesk server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
