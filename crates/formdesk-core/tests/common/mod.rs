// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for formdesk-core integration tests.
//!
//! Provides an in-memory [`Resource`] with configurable latency and failure
//! injection, and an in-memory SQLite persistence.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;

use formdesk_core::error::Result;
use formdesk_core::form::{FieldDescriptor, FieldError, FormDescriptor, RawFields};
use formdesk_core::pagination::PageRequest;
use formdesk_core::persistence::{Persistence, SqlitePersistence};
use formdesk_core::resource::{Resource, RowError};
use formdesk_core::table::TableDescriptor;
use formdesk_core::{Entity, EntityId, ResourceError, migrations};

/// Skip a test when `TEST_FORMDESK_DATABASE_URL` is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        match std::env::var("TEST_FORMDESK_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("Skipping test: TEST_FORMDESK_DATABASE_URL not set");
                return;
            }
        }
    };
}

/// In-memory SQLite persistence with migrations applied.
pub async fn sqlite_persistence() -> Arc<dyn Persistence> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");

    migrations::run_sqlite(&pool)
        .await
        .expect("Failed to run migrations");

    Arc::new(SqlitePersistence::new(pool))
}

/// Map of submitted form values.
pub fn fields(pairs: &[(&str, &str)]) -> RawFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Row type of [`MemoryResource`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub id: EntityId,
    pub name: String,
}

impl Entity for Item {
    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }
}

/// Resource over a vector of items.
pub struct MemoryResource {
    items: Mutex<Vec<Item>>,
    latency: Duration,
    failing: AtomicBool,
    fetches: AtomicUsize,
    table: TableDescriptor<Item>,
    form: FormDescriptor<Item>,
}

impl MemoryResource {
    /// A resource holding `count` items named `item-<n>`.
    pub fn with_items(count: usize) -> Self {
        let items = (1..=count)
            .map(|i| Item {
                id: i as EntityId,
                name: format!("item-{i}"),
            })
            .collect();

        Self {
            items: Mutex::new(items),
            latency: Duration::ZERO,
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            table: TableDescriptor::builder("Items")
                .row_url(|i: &Item| format!("/items/{}", i.id))
                .create("Create item", "/items/create")
                .stream_url("/items/stream")
                .column("Id", |i: &Item| i.id.to_string())
                .column("Name", |i: &Item| i.name.clone())
                .build()
                .expect("valid table"),
            form: FormDescriptor::new(
                vec![
                    FieldDescriptor::text("name", "Name", |i: &Item| i.name.clone()).required(),
                ],
                |i: Option<&Item>| match i {
                    Some(i) if i.id != 0 => format!("/items/{}", i.id),
                    _ => "/items".to_string(),
                },
            )
            .expect("valid form"),
        }
    }

    /// Delay every `fetch_page` call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make storage calls fail.
    pub fn failing(self) -> Self {
        self.failing.store(true, Ordering::SeqCst);
        self
    }

    /// Number of `fetch_page` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check_storage(&self, operation: &'static str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ResourceError::storage(operation)(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl Resource for MemoryResource {
    type Row = Item;

    fn title(&self) -> &str {
        "Items"
    }

    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<Item>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.check_storage("list_items")?;

        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .cloned()
            .collect())
    }

    async fn fetch_row(&self, id: EntityId) -> Result<Item> {
        self.check_storage("get_item")?;
        self.items
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or(ResourceError::NotFound {
                resource: "item",
                id,
            })
    }

    async fn parse_fields(&self, id: Option<EntityId>, raw: &RawFields) -> (Item, Vec<RowError>) {
        let item = Item {
            id: id.unwrap_or(0),
            name: raw.get("name").map(|n| n.trim().to_string()).unwrap_or_default(),
        };

        if let Err(e) = self.check_storage("item_name_exists") {
            return (item, vec![RowError::System(e)]);
        }
        if item.name.starts_with('#') {
            let error = FieldError::new("name", "Invalid name");
            return (item, vec![RowError::Parsing(error)]);
        }
        if item.name == "forbidden" {
            let error = FieldError::new("name", "Name is not allowed");
            return (item, vec![RowError::Validation(error)]);
        }
        let taken = self
            .items
            .lock()
            .unwrap()
            .iter()
            .any(|i| i.name == item.name && i.id != item.id);
        if taken {
            let error = FieldError::new("name", "already used");
            return (item, vec![RowError::Conflict(error)]);
        }
        (item, Vec::new())
    }

    async fn create_row(&self, row: &Item) -> Result<EntityId> {
        self.check_storage("insert_item")?;
        let mut items = self.items.lock().unwrap();
        let id = items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        items.push(row.clone().with_id(id));
        Ok(id)
    }

    async fn update_row(&self, row: &Item) -> Result<()> {
        self.check_storage("update_item")?;
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|i| i.id == row.id) {
            Some(existing) => {
                *existing = row.clone();
                Ok(())
            }
            None => Err(ResourceError::NotFound {
                resource: "item",
                id: row.id,
            }),
        }
    }

    fn table_config(&self) -> &TableDescriptor<Item> {
        &self.table
    }

    fn form_config(&self) -> &FormDescriptor<Item> {
        &self.form
    }

    fn location(&self, row: Option<&Item>) -> String {
        self.form.save_target(row)
    }
}
