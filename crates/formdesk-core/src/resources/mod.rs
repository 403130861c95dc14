// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Concrete resources.
//!
//! | Resource | Path | Row | Order |
//! |----------|------|-----|-------|
//! | [`UserResource`] | `/users` | [`User`](crate::persistence::User) | id |
//! | [`AssignmentResource`] | `/assignments` | [`Assignment`](crate::persistence::Assignment) | order, id |

pub mod assignments;
pub mod users;

pub use self::assignments::AssignmentResource;
pub use self::users::UserResource;

use crate::entity::EntityId;

/// `base` for new rows, `base/{id}` for persisted ones.
pub(crate) fn row_location(base: &str, id: Option<EntityId>) -> String {
    match id {
        Some(id) if id != 0 => format!("{base}/{id}"),
        _ => base.to_string(),
    }
}
