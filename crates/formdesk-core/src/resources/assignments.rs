// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The assignments resource.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{Entity, EntityId};
use crate::error::{DescriptorError, ResourceError, Result};
use crate::form::{FieldDescriptor, FieldError, FormDescriptor, RawFields, SelectOption};
use crate::pagination::PageRequest;
use crate::persistence::{Assignment, Persistence};
use crate::resource::{Resource, RowError};
use crate::table::TableDescriptor;

use super::row_location;

const BASE: &str = "/assignments";

impl Entity for Assignment {
    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }
}

/// Assignments: a name and a type, kept in server-assigned order.
pub struct AssignmentResource {
    persistence: Arc<dyn Persistence>,
    table: TableDescriptor<Assignment>,
    form: FormDescriptor<Assignment>,
}

impl AssignmentResource {
    /// Build the resource and its descriptors.
    pub fn new(persistence: Arc<dyn Persistence>) -> std::result::Result<Self, DescriptorError> {
        let table = TableDescriptor::builder("Assignments")
            .row_url(|a: &Assignment| row_location(BASE, Some(a.id)))
            .create("Create assignment", format!("{BASE}/create"))
            .stream_url(format!("{BASE}/stream"))
            .column("Id", |a: &Assignment| a.id.to_string())
            .column("Name", |a: &Assignment| a.name.clone())
            .column("Type", |a: &Assignment| a.kind.clone())
            .column("Order", |a: &Assignment| a.order.to_string())
            .build()?;

        let form = FormDescriptor::new(
            vec![
                FieldDescriptor::text("name", "Name", |a: &Assignment| a.name.clone())
                    .placeholder("Enter a name")
                    .required(),
                FieldDescriptor::select(
                    "type",
                    "Type",
                    vec![
                        SelectOption::new("Text", "text"),
                        SelectOption::new("Sound", "sound"),
                    ],
                    |a: &Assignment| a.kind.clone(),
                )
                .required(),
            ],
            |a: Option<&Assignment>| row_location(BASE, a.map(|a| a.id)),
        )?;

        Ok(Self {
            persistence,
            table,
            form,
        })
    }
}

#[async_trait]
impl Resource for AssignmentResource {
    type Row = Assignment;

    fn title(&self) -> &str {
        "Assignments"
    }

    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<Assignment>> {
        self.persistence
            .list_assignments(page.offset(), page.limit())
            .await
    }

    async fn fetch_row(&self, id: EntityId) -> Result<Assignment> {
        self.persistence
            .get_assignment(id)
            .await?
            .ok_or(ResourceError::NotFound {
                resource: "assignment",
                id,
            })
    }

    async fn parse_fields(
        &self,
        id: Option<EntityId>,
        raw: &RawFields,
    ) -> (Assignment, Vec<RowError>) {
        let field = |name: &str| raw.get(name).map(|v| v.trim()).unwrap_or("");

        let assignment = Assignment {
            id: id.unwrap_or(0),
            name: field("name").to_string(),
            kind: field("type").to_string(),
            order: 0,
        };

        let mut errors = Vec::new();
        if assignment.kind == "sound" {
            let error = FieldError::new("type", "Sound type is not supported yet");
            errors.push(RowError::Validation(error));
        }

        (assignment, errors)
    }

    async fn create_row(&self, row: &Assignment) -> Result<EntityId> {
        self.persistence.insert_assignment(row).await
    }

    async fn update_row(&self, row: &Assignment) -> Result<()> {
        self.persistence.update_assignment(row).await
    }

    fn table_config(&self) -> &TableDescriptor<Assignment> {
        &self.table
    }

    fn form_config(&self) -> &FormDescriptor<Assignment> {
        &self.form
    }

    fn location(&self, row: Option<&Assignment>) -> String {
        row_location(BASE, row.map(|a| a.id))
    }
}
