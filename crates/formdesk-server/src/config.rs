// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for formdesk-server.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use formdesk_core::lifecycle::{DEFAULT_INDEX_BUDGET, LifecycleConfig};
use formdesk_core::stream::{DEFAULT_MAX_PAGES, StreamConfig};

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Local development.
    Dev,
    /// Production: cookies are marked `Secure`.
    Production,
}

impl Environment {
    /// Whether this is production.
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (`postgres://...` or `sqlite:...`)
    pub database_url: String,
    /// Maximum number of pooled database connections
    pub db_max_connections: u32,
    /// HTTP bind address
    pub bind_addr: SocketAddr,
    /// Deployment environment
    pub environment: Environment,
    /// Secret used to sign session and login-link tokens
    pub jwt_secret: String,
    /// Public base URL, used to build login links
    pub public_url: String,
    /// Root directory of the local upload disk
    pub upload_dir: PathBuf,
    /// URL prefix under which uploaded files are served
    pub upload_base_url: String,
    /// Latency budget of the index fetch
    pub index_budget: Duration,
    /// Maximum number of pages per streaming session
    pub stream_max_pages: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("FORMDESK_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .map_err(|_| ConfigError::MissingEnvVar("FORMDESK_DATABASE_URL or DATABASE_URL"))?;

        let host = env::var("FORMDESK_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("FORMDESK_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FORMDESK_HOST"))?;

        let environment = match env::var("FORMDESK_ENVIRONMENT").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("dev") | Ok("development") | Err(_) => Environment::Dev,
            Ok(_) => return Err(ConfigError::InvalidValue("FORMDESK_ENVIRONMENT")),
        };

        let jwt_secret = env::var("FORMDESK_JWT_SECRET")
            .map_err(|_| ConfigError::MissingEnvVar("FORMDESK_JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue("FORMDESK_JWT_SECRET"));
        }

        let public_url = env::var("FORMDESK_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let upload_dir = PathBuf::from(
            env::var("FORMDESK_UPLOAD_DIR").unwrap_or_else(|_| "./storage/public".to_string()),
        );
        let upload_base_url = env::var("FORMDESK_UPLOAD_BASE_URL")
            .unwrap_or_else(|_| "/storage".to_string())
            .trim_end_matches('/')
            .to_string();

        let index_budget = match env::var("FORMDESK_INDEX_BUDGET_MS") {
            Ok(raw) => Duration::from_millis(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidValue("FORMDESK_INDEX_BUDGET_MS"))?,
            ),
            Err(_) => DEFAULT_INDEX_BUDGET,
        };

        let stream_max_pages = parse_or("FORMDESK_STREAM_MAX_PAGES", DEFAULT_MAX_PAGES)?;
        if stream_max_pages == 0 {
            return Err(ConfigError::InvalidValue("FORMDESK_STREAM_MAX_PAGES"));
        }
        let db_max_connections = parse_or("FORMDESK_DB_MAX_CONNECTIONS", 10)?;
        if db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("FORMDESK_DB_MAX_CONNECTIONS"));
        }

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            environment,
            jwt_secret,
            public_url,
            upload_dir,
            upload_base_url,
            index_budget,
            stream_max_pages,
        })
    }

    /// Lifecycle engine settings derived from this configuration.
    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            index_budget: self.index_budget,
            stream: StreamConfig {
                max_pages: self.stream_max_pages,
                ..StreamConfig::default()
            },
        }
    }
}

fn parse_or(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
    /// An environment variable holds an unusable value.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
