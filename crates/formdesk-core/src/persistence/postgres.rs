// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use sqlx::PgPool;

use crate::entity::EntityId;
use crate::error::{ResourceError, Result};

use super::{Assignment, Persistence, User, unique_violation};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, date_of_birth
            FROM users
            ORDER BY id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(ResourceError::storage("list_users"))
    }

    async fn get_user(&self, id: EntityId) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, date_of_birth FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ResourceError::storage("get_user"))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, date_of_birth FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ResourceError::storage("get_user_by_email"))
    }

    async fn user_with_email_exists(&self, email: &str, excluding_id: EntityId) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)",
        )
        .bind(email)
        .bind(excluding_id)
        .fetch_one(&self.pool)
        .await
        .map_err(ResourceError::storage("user_with_email_exists"))
    }

    async fn insert_user(&self, user: &User) -> Result<EntityId> {
        sqlx::query_scalar::<_, EntityId>(
            r#"
            INSERT INTO users (name, email, date_of_birth)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.date_of_birth)
        .fetch_one(&self.pool)
        .await
        .map_err(unique_violation("insert_user", "email"))
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = $1, email = $2, date_of_birth = $3, updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.date_of_birth)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(unique_violation("update_user", "email"))?;

        if result.rows_affected() == 0 {
            return Err(ResourceError::NotFound {
                resource: "user",
                id: user.id,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    async fn list_assignments(&self, offset: i64, limit: i64) -> Result<Vec<Assignment>> {
        sqlx::query_as::<_, Assignment>(
            r#"
            SELECT id, name, "type", "order"
            FROM assignments
            ORDER BY "order", id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(ResourceError::storage("list_assignments"))
    }

    async fn get_assignment(&self, id: EntityId) -> Result<Option<Assignment>> {
        sqlx::query_as::<_, Assignment>(
            r#"SELECT id, name, "type", "order" FROM assignments WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ResourceError::storage("get_assignment"))
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> Result<EntityId> {
        sqlx::query_scalar::<_, EntityId>(
            r#"
            INSERT INTO assignments (name, "type", "order")
            SELECT $1, $2, COALESCE(MAX("order"), 0) + 1 FROM assignments
            RETURNING id
            "#,
        )
        .bind(&assignment.name)
        .bind(&assignment.kind)
        .fetch_one(&self.pool)
        .await
        .map_err(ResourceError::storage("insert_assignment"))
    }

    async fn update_assignment(&self, assignment: &Assignment) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET name = $1, "type" = $2, updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(&assignment.name)
        .bind(&assignment.kind)
        .bind(assignment.id)
        .execute(&self.pool)
        .await
        .map_err(ResourceError::storage("update_assignment"))?;

        if result.rows_affected() == 0 {
            return Err(ResourceError::NotFound {
                resource: "assignment",
                id: assignment.id,
            });
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(ResourceError::storage("health_check"))?;
        Ok(())
    }
}
