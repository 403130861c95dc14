// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Upload storage.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Disk errors.
#[derive(Debug, Error)]
pub enum DiskError {
    /// The location escapes the disk root or is empty.
    #[error("invalid location '{0}'")]
    InvalidLocation(String),

    /// Nothing is stored at the location.
    #[error("'{0}' not found")]
    NotFound(String),

    /// Filesystem failure.
    #[error("{operation} '{location}' failed: {source}")]
    Io {
        /// Operation name.
        operation: &'static str,
        /// Relative location.
        location: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Stores uploaded files under relative locations.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Whether something is stored at `location`.
    async fn exists(&self, location: &str) -> Result<bool, DiskError>;

    /// Store `data` at `location`, replacing existing content.
    async fn put(&self, location: &str, data: Bytes) -> Result<(), DiskError>;

    /// Content stored at `location`.
    async fn get(&self, location: &str) -> Result<Bytes, DiskError>;

    /// Public URL of `location`.
    fn url(&self, location: &str) -> String;
}

/// Disk backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalDisk {
    root: PathBuf,
    base_url: String,
}

impl LocalDisk {
    /// Disk rooted at `root`, served under `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, DiskError> {
        let invalid = location.is_empty()
            || location.starts_with('/')
            || location.contains('\\')
            || location.split('/').any(|part| part == ".." || part.is_empty());
        if invalid {
            return Err(DiskError::InvalidLocation(location.to_string()));
        }
        Ok(self.root.join(location))
    }
}

fn io(operation: &'static str, location: &str) -> impl FnOnce(std::io::Error) -> DiskError {
    let location = location.to_string();
    move |source| DiskError::Io {
        operation,
        location,
        source,
    }
}

#[async_trait]
impl Disk for LocalDisk {
    async fn exists(&self, location: &str) -> Result<bool, DiskError> {
        let path = self.resolve(location)?;
        tokio::fs::try_exists(&path).await.map_err(io("stat", location))
    }

    async fn put(&self, location: &str, data: Bytes) -> Result<(), DiskError> {
        let path = self.resolve(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io("create directory for", location))?;
        }
        tokio::fs::write(&path, &data).await.map_err(io("write", location))?;
        debug!(location, bytes = data.len(), "Stored file");
        Ok(())
    }

    async fn get(&self, location: &str) -> Result<Bytes, DiskError> {
        let path = self.resolve(location)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(DiskError::NotFound(location.to_string()))
            }
            Err(e) => Err(io("read", location)(e)),
        }
    }

    fn url(&self, location: &str) -> String {
        format!("{}/{}", self.base_url, location)
    }
}
