// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL backend tests.
//!
//! Run with `TEST_FORMDESK_DATABASE_URL=postgres://...`; skipped otherwise.
//! Each test works with unique emails so runs against a shared database do
//! not interfere.

mod common;

use chrono::NaiveDate;
use uuid::Uuid;

use formdesk_core::persistence::{self, Assignment, User};

fn unique_user() -> User {
    User {
        id: 0,
        name: "Postgres User".to_string(),
        email: format!("{}@example.com", Uuid::new_v4()),
        date_of_birth: NaiveDate::from_ymd_opt(1980, 2, 29).unwrap(),
    }
}

#[tokio::test]
async fn test_postgres_user_roundtrip() {
    let url = skip_if_no_db!();
    let store = persistence::connect(&url, 2).await.expect("connect");

    let user = unique_user();
    let id = store.insert_user(&user).await.unwrap();
    let fetched = store.get_user(id).await.unwrap().expect("user exists");
    assert_eq!(fetched, User { id, ..user.clone() });

    assert!(store.user_with_email_exists(&user.email, 0).await.unwrap());
    assert!(!store.user_with_email_exists(&user.email, id).await.unwrap());

    let err = store.insert_user(&user).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_postgres_update_missing_user() {
    let url = skip_if_no_db!();
    let store = persistence::connect(&url, 2).await.expect("connect");

    let missing = User {
        id: i32::MAX,
        ..unique_user()
    };
    assert!(store.update_user(&missing).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_postgres_assignment_order() {
    let url = skip_if_no_db!();
    let store = persistence::connect(&url, 2).await.expect("connect");

    let assignment = Assignment {
        id: 0,
        name: "pg".to_string(),
        kind: "text".to_string(),
        order: 0,
    };
    let first = store.insert_assignment(&assignment).await.unwrap();
    let second = store.insert_assignment(&assignment).await.unwrap();

    let first = store.get_assignment(first).await.unwrap().unwrap();
    let second = store.get_assignment(second).await.unwrap().unwrap();
    assert!(second.order > first.order);

    store.health_check().await.unwrap();
}
