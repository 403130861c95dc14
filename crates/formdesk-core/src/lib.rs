// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Formdesk Core - Generic Resource Lifecycle Engine
//!
//! This crate provides the uniform contract that every tabular entity of the
//! administration panel (users, assignments, ...) implements, and the engine
//! that drives list/view/validate/create/update requests over it with
//! consistent error semantics and pagination/streaming behaviour.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          formdesk-server                                 │
//! │          (axum routes, rendering, sessions, mail, uploads)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      formdesk-core (This Crate)                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐     │
//! │  │ Descriptors │  │  Resource   │  │  Lifecycle  │  │   Stream    │     │
//! │  │ form/table  │  │  contract   │  │   engine    │  │   driver    │     │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  └─────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                  Persistence (PostgreSQL / SQLite)                     │
//! │                        (users, assignments)                            │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Request Lifecycle
//!
//! ```text
//!   raw form fields
//!         │
//!         ▼
//!   ┌───────────┐  field validators (form order, all fields)
//!   │ parse_row │  type conversion → business rules → uniqueness
//!   └─────┬─────┘
//!         │
//!    ┌────┴──────────┬───────────────┬──────────────┬─────────────┐
//!    ▼               ▼               ▼              ▼             ▼
//!  parse error   field errors     conflict       system        clean
//!  (400)         (422)            (200)          (500)           │
//!                                                                ▼
//!                                                      create_row / update_row
//!                                                                │
//!                                                 ┌──────────────┼──────────┐
//!                                                 ▼              ▼          ▼
//!                                              Success        Conflict    System
//! ```
//!
//! # Outcomes
//!
//! | Outcome | Status class | Meaning |
//! |---------|--------------|---------|
//! | `Success` | 200 | Row persisted, index re-rendered with a notice |
//! | `ParsingFailure` | 400 | A value could not be converted (e.g. a date) |
//! | `ValidationFailure` | 422 | One or more fields violate a rule |
//! | `Conflict` | 200 | A unique value is already taken |
//! | `SystemFailure` | 500 | Storage unavailable or unexpected fault |
//!
//! # Modules
//!
//! - [`entity`]: Identity contract shared by every row type
//! - [`form`]: Field and form descriptors with per-field validators
//! - [`table`]: Table descriptors (columns, row links, stream link)
//! - [`resource`]: The resource contract binding a row type to its behaviour
//! - [`lifecycle`]: The request lifecycle engine
//! - [`pagination`]: Page window parsing and validation
//! - [`stream`]: Paced multi-page streaming driver
//! - [`persistence`]: Storage collaborator with PostgreSQL and SQLite backends
//! - [`resources`]: The user and assignment resources

#![deny(missing_docs)]

/// Identity contract shared by every row type.
pub mod entity;

/// Error types for resources, descriptors and persistence.
pub mod error;

/// Field and form descriptors.
pub mod form;

/// Request lifecycle engine (index, view, validate, create, update, stream).
pub mod lifecycle;

/// Embedded database migrations.
pub mod migrations;

/// Page window parsing and validation.
pub mod pagination;

/// Storage collaborator and its backends.
pub mod persistence;

/// The resource contract.
pub mod resource;

/// Concrete resources (users, assignments).
pub mod resources;

/// Paced streaming of successive pages.
pub mod stream;

/// Table descriptors.
pub mod table;

pub use entity::{Entity, EntityId};
pub use error::{DescriptorError, ResourceError};
pub use form::{FieldDescriptor, FieldError, FieldErrors, FieldKind, FormDescriptor, RawFields};
pub use lifecycle::{Commit, Lifecycle, LifecycleConfig, LifecycleError, Notice, Outcome};
pub use pagination::PageRequest;
pub use resource::{ParsedRow, Resource, RowError};
pub use table::TableDescriptor;
