// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage collaborator for formdesk.
//!
//! Resources reach the database only through the [`Persistence`] trait, which
//! exposes keyed CRUD plus a paged scan per table. Two backends implement it:
//! [`PostgresPersistence`] and [`SqlitePersistence`]. Every driver error is
//! wrapped with the operation name before it leaves this module.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::entity::EntityId;
use crate::error::{ResourceError, Result};
use crate::migrations;

/// User record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    /// Primary key, `0` before insertion.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Unique email address, also the login identity.
    pub email: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
}

/// Assignment record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Assignment {
    /// Primary key, `0` before insertion.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Assignment type (`text`, `sound`).
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    /// Server-assigned position in the list.
    pub order: i32,
}

/// Storage operations used by the resources and the surrounding handlers.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Users ordered by id.
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>>;

    /// A user by id, `None` when absent.
    async fn get_user(&self, id: EntityId) -> Result<Option<User>>;

    /// A user by email, `None` when absent.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Whether a user other than `excluding_id` uses `email`.
    async fn user_with_email_exists(&self, email: &str, excluding_id: EntityId) -> Result<bool>;

    /// Insert a user and return its id. Duplicate emails are a conflict.
    async fn insert_user(&self, user: &User) -> Result<EntityId>;

    /// Update a user. Duplicate emails are a conflict, a missing row is
    /// [`ResourceError::NotFound`].
    async fn update_user(&self, user: &User) -> Result<()>;

    /// Assignments ordered by their order column, then id.
    async fn list_assignments(&self, offset: i64, limit: i64) -> Result<Vec<Assignment>>;

    /// An assignment by id, `None` when absent.
    async fn get_assignment(&self, id: EntityId) -> Result<Option<Assignment>>;

    /// Insert an assignment at the end of the list and return its id.
    async fn insert_assignment(&self, assignment: &Assignment) -> Result<EntityId>;

    /// Update an assignment's name and type. The order is kept.
    async fn update_assignment(&self, assignment: &Assignment) -> Result<()>;

    /// Whether the database answers.
    async fn health_check(&self) -> Result<()>;
}

/// Map a driver error to a conflict when it is a unique violation on `field`.
pub(crate) fn unique_violation(
    operation: &'static str,
    field: &'static str,
) -> impl FnOnce(sqlx::Error) -> ResourceError {
    move |e| {
        if let sqlx::Error::Database(db) = &e
            && db.is_unique_violation()
        {
            return ResourceError::already_used(field);
        }
        ResourceError::Storage {
            operation,
            source: e,
        }
    }
}

/// Connect to `url` and run pending migrations.
///
/// `sqlite:` URLs select the SQLite backend, anything else PostgreSQL. An
/// in-memory SQLite database is limited to a single connection so every
/// query sees the same data.
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn Persistence>> {
    if url.starts_with("sqlite:") {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(ResourceError::storage("connect"))?
            .create_if_missing(true);
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            max_connections
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(ResourceError::storage("connect"))?;

        migrations::run_sqlite(&pool)
            .await
            .map_err(|e| ResourceError::storage("migrate")(sqlx::Error::Migrate(Box::new(e))))?;
        info!(backend = "sqlite", "Database ready");
        Ok(Arc::new(SqlitePersistence::new(pool)))
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(ResourceError::storage("connect"))?;

        migrations::run_postgres(&pool)
            .await
            .map_err(|e| ResourceError::storage("migrate")(sqlx::Error::Migrate(Box::new(e))))?;
        info!(backend = "postgres", max_connections, "Database ready");
        Ok(Arc::new(PostgresPersistence::new(pool)))
    }
}
