// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The users resource.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};

use crate::entity::{Entity, EntityId};
use crate::error::{DescriptorError, ResourceError, Result};
use crate::form::{FieldDescriptor, FieldError, FormDescriptor, RawFields};
use crate::pagination::PageRequest;
use crate::persistence::{Persistence, User};
use crate::resource::{Resource, RowError};
use crate::table::TableDescriptor;

use super::row_location;

const BASE: &str = "/users";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Minimum age of a user, in whole years.
pub const MINIMUM_AGE: i32 = 18;

impl Entity for User {
    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }
}

/// Age in whole years on `today`.
pub fn age_on(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Users: name, unique email and date of birth.
pub struct UserResource {
    persistence: Arc<dyn Persistence>,
    table: TableDescriptor<User>,
    form: FormDescriptor<User>,
}

impl UserResource {
    /// Build the resource and its descriptors.
    pub fn new(persistence: Arc<dyn Persistence>) -> std::result::Result<Self, DescriptorError> {
        let table = TableDescriptor::builder("Users")
            .row_url(|u: &User| row_location(BASE, Some(u.id)))
            .create("Create user", format!("{BASE}/create"))
            .stream_url(format!("{BASE}/stream"))
            .column("Id", |u: &User| u.id.to_string())
            .column("Name", |u: &User| u.name.clone())
            .column("Email", |u: &User| u.email.clone())
            .column("Age", |u: &User| {
                format!("{} years", age_on(u.date_of_birth, today()))
            })
            .build()?;

        let form = FormDescriptor::new(
            vec![
                FieldDescriptor::text("name", "Name", |u: &User| u.name.clone())
                    .placeholder("Enter a name")
                    .required(),
                FieldDescriptor::email("email", "Email", |u: &User| u.email.clone())
                    .placeholder("Enter an email")
                    .required(),
                FieldDescriptor::date("date_of_birth", "Birthdate", |u: &User| {
                    u.date_of_birth.format(DATE_FORMAT).to_string()
                })
                .placeholder("Enter the date of birth")
                .required(),
            ],
            |u: Option<&User>| row_location(BASE, u.map(|u| u.id)),
        )?;

        Ok(Self {
            persistence,
            table,
            form,
        })
    }
}

#[async_trait]
impl Resource for UserResource {
    type Row = User;

    fn title(&self) -> &str {
        "Users"
    }

    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<User>> {
        self.persistence
            .list_users(page.offset(), page.limit())
            .await
    }

    async fn fetch_row(&self, id: EntityId) -> Result<User> {
        self.persistence
            .get_user(id)
            .await?
            .ok_or(ResourceError::NotFound {
                resource: "user",
                id,
            })
    }

    async fn parse_fields(&self, id: Option<EntityId>, raw: &RawFields) -> (User, Vec<RowError>) {
        let field = |name: &str| raw.get(name).map(|v| v.trim()).unwrap_or("");

        let mut user = User {
            id: id.unwrap_or(0),
            name: field("name").to_string(),
            email: field("email").to_string(),
            date_of_birth: NaiveDate::default(),
        };
        let mut errors = Vec::new();

        if !user.email.is_empty() {
            match self
                .persistence
                .user_with_email_exists(&user.email, user.id)
                .await
            {
                Ok(true) => {
                    let error = FieldError::new("email", "already used");
                    errors.push(RowError::Conflict(error));
                }
                Ok(false) => {}
                Err(e) => errors.push(RowError::System(e)),
            }
        }

        // An empty date is left to the required validator.
        let date = field("date_of_birth");
        if !date.is_empty() {
            match NaiveDate::parse_from_str(date, DATE_FORMAT) {
                Ok(parsed) if age_on(parsed, today()) < MINIMUM_AGE => {
                    user.date_of_birth = parsed;
                    let error = FieldError::new(
                        "date_of_birth",
                        format!("Minimum age is {MINIMUM_AGE}"),
                    );
                    errors.push(RowError::Validation(error));
                }
                Ok(parsed) => user.date_of_birth = parsed,
                Err(_) => {
                    let error = FieldError::new("date_of_birth", "Invalid date");
                    errors.push(RowError::Parsing(error));
                }
            }
        }

        (user, errors)
    }

    async fn create_row(&self, row: &User) -> Result<EntityId> {
        self.persistence.insert_user(row).await
    }

    async fn update_row(&self, row: &User) -> Result<()> {
        self.persistence.update_user(row).await
    }

    fn table_config(&self) -> &TableDescriptor<User> {
        &self.table
    }

    fn form_config(&self) -> &FormDescriptor<User> {
        &self.form
    }

    fn location(&self, row: Option<&User>) -> String {
        row_location(BASE, row.map(|u| u.id))
    }
}
