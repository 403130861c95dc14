// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! formdesk server - resource administration over HTTP
//!
//! Serves:
//! - Users and assignments screens (index, stream, create, edit, validate)
//! - Passwordless login via emailed links
//! - File uploads to a local disk

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use formdesk_core::persistence;
use formdesk_server::config::Config;
use formdesk_server::disk::LocalDisk;
use formdesk_server::mail::LogMailer;
use formdesk_server::{AppState, router, serve};

const DEFAULT_LOG_FILTER: &str = "formdesk_server=info,formdesk_core=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if std::env::var("FORMDESK_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        bind_addr = %config.bind_addr,
        environment = ?config.environment,
        upload_dir = %config.upload_dir.display(),
        "Starting formdesk server"
    );

    // Connect to database and run migrations
    let persistence = persistence::connect(&config.database_url, config.db_max_connections).await?;
    info!("Database ready");

    let mailer = Arc::new(LogMailer);
    let disk = Arc::new(LocalDisk::new(&config.upload_dir, &config.upload_base_url));
    let state = AppState::new(&config, persistence, mailer, disk)?;

    let listener = TcpListener::bind(config.bind_addr).await?;
    serve(listener, router(state)).await?;

    Ok(())
}
