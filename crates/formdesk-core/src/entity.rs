// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identity contract for row types.

use serde::Serialize;

/// Integer identity of a persisted row. `0` means "not yet persisted".
pub type EntityId = i32;

/// A record type managed by a [`Resource`](crate::resource::Resource).
///
/// Rows are constructed in memory by `parse_row` (from storage or submitted
/// form fields), persisted by `create_row`/`update_row`, and never cached
/// across requests.
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// The row identity, `0` when the row has not been persisted yet.
    fn id(&self) -> EntityId;

    /// Return the row with its identity replaced by `id`.
    fn with_id(self, id: EntityId) -> Self;

    /// Whether the row has been persisted.
    fn is_persisted(&self) -> bool {
        self.id() != 0
    }
}
