// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use sqlx::SqlitePool;

use crate::entity::EntityId;
use crate::error::{ResourceError, Result};

use super::{Assignment, Persistence, User, unique_violation};

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, date_of_birth
            FROM users
            ORDER BY id
            LIMIT ? OFFSET ?
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
            "SELECT id, name, email, date_of_birth FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ResourceError::storage("get_user"))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, date_of_birth FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(ResourceError::storage("get_user_by_email"))
    }

    async fn user_with_email_exists(&self, email: &str, excluding_id: EntityId) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ? AND id != ?")
                .bind(email)
                .bind(excluding_id)
                .fetch_one(&self.pool)
                .await
                .map_err(ResourceError::storage("user_with_email_exists"))?;

        Ok(count > 0)
    }

    async fn insert_user(&self, user: &User) -> Result<EntityId> {
        sqlx::query_scalar::<_, EntityId>(
            r#"
            INSERT INTO users (name, email, date_of_birth)
            VALUES (?, ?, ?)
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
            SET name = ?, email = ?, date_of_birth = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
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

    async fn list_assignments(&self, offset: i64, limit: i64) -> Result<Vec<Assignment>> {
        sqlx::query_as::<_, Assignment>(
            r#"
            SELECT id, name, "type", "order"
            FROM assignments
            ORDER BY "order", id
            LIMIT ? OFFSET ?
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
            r#"SELECT id, name, "type", "order" FROM assignments WHERE id = ?"#,
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
            VALUES (?, ?, (SELECT COALESCE(MAX("order"), 0) + 1 FROM assignments))
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
            SET name = ?, "type" = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    /// Create an in-memory SQLite pool for testing.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn user(name: &str, email: &str) -> User {
        User {
            id: 0,
            name: name.to_string(),
            email: email.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        }
    }

    fn assignment(name: &str) -> Assignment {
        Assignment {
            id: 0,
            name: name.to_string(),
            kind: "text".to_string(),
            order: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let persistence = SqlitePersistence::new(test_pool().await);

        let id = persistence
            .insert_user(&user("Ada", "ada@example.com"))
            .await
            .expect("Failed to insert user");
        assert!(id > 0);

        let fetched = persistence
            .get_user(id)
            .await
            .expect("Query should succeed")
            .expect("User should exist");
        assert_eq!(fetched, User { id, ..user("Ada", "ada@example.com") });

        let by_email = persistence
            .get_user_by_email("ada@example.com")
            .await
            .expect("Query should succeed");
        assert_eq!(by_email.map(|u| u.id), Some(id));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let result = persistence.get_user(999).await.expect("Query should succeed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let persistence = SqlitePersistence::new(test_pool().await);
        persistence
            .insert_user(&user("Ada", "ada@example.com"))
            .await
            .unwrap();

        let err = persistence
            .insert_user(&user("Other", "ada@example.com"))
            .await
            .unwrap_err();
        match err {
            ResourceError::Conflict { field, message } => {
                assert_eq!(field, "email");
                assert_eq!(message, "already used");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_user() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let ada = persistence
            .insert_user(&user("Ada", "ada@example.com"))
            .await
            .unwrap();
        let bob = persistence
            .insert_user(&user("Bob", "bob@example.com"))
            .await
            .unwrap();

        let renamed = User {
            id: ada,
            ..user("Ada Lovelace", "ada@example.com")
        };
        persistence.update_user(&renamed).await.unwrap();
        assert_eq!(persistence.get_user(ada).await.unwrap(), Some(renamed));

        let stolen = User {
            id: bob,
            ..user("Bob", "ada@example.com")
        };
        assert!(persistence.update_user(&stolen).await.unwrap_err().is_conflict());

        let missing = User {
            id: 999,
            ..user("Nobody", "nobody@example.com")
        };
        assert!(persistence.update_user(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_user_with_email_exists_excludes_self() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let id = persistence
            .insert_user(&user("Ada", "ada@example.com"))
            .await
            .unwrap();

        assert!(persistence.user_with_email_exists("ada@example.com", 0).await.unwrap());
        assert!(!persistence.user_with_email_exists("ada@example.com", id).await.unwrap());
        assert!(!persistence.user_with_email_exists("bob@example.com", 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_users_pages() {
        let persistence = SqlitePersistence::new(test_pool().await);
        for i in 0..5 {
            persistence
                .insert_user(&user(&format!("User {i}"), &format!("user{i}@example.com")))
                .await
                .unwrap();
        }

        let first = persistence.list_users(0, 2).await.unwrap();
        let second = persistence.list_users(2, 2).await.unwrap();
        let third = persistence.list_users(4, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(third.len(), 1);
        assert!(first[1].id < second[0].id);
        assert!(second[1].id < third[0].id);
    }

    #[tokio::test]
    async fn test_assignments_get_increasing_order() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let first = persistence.insert_assignment(&assignment("First")).await.unwrap();
        let second = persistence.insert_assignment(&assignment("Second")).await.unwrap();

        let listed = persistence.list_assignments(0, 10).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[0].order, 1);
        assert_eq!(listed[1].id, second);
        assert_eq!(listed[1].order, 2);
    }

    #[tokio::test]
    async fn test_update_assignment_keeps_order() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let id = persistence.insert_assignment(&assignment("First")).await.unwrap();

        let changed = Assignment {
            id,
            name: "Renamed".to_string(),
            kind: "text".to_string(),
            order: 42,
        };
        persistence.update_assignment(&changed).await.unwrap();

        let fetched = persistence.get_assignment(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");
        assert_eq!(fetched.order, 1);

        let missing = Assignment { id: 999, ..changed };
        assert!(persistence.update_assignment(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_health_check() {
        let persistence = SqlitePersistence::new(test_pool().await);
        persistence.health_check().await.expect("Health check should pass");
    }
}
