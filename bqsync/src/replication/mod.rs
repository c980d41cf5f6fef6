//! Classification and application of row change events.
//!
//! The [`dispatch::Dispatcher`] resolves the rule of an event's table, routes the event through
//! the [`dispatch::ROUTING_TABLE`] and hands it to the [`materialize::Materializer`] or the
//! [`delete::Deleter`]. Every failure is returned to the caller unchanged.

pub mod delete;
pub mod dispatch;
pub mod materialize;

pub use delete::Deleter;
pub use dispatch::{DispatchOutcome, Dispatcher, ROUTING_TABLE, Route, RouteTarget, route};
pub use materialize::Materializer;

use crate::types::RowImage;

/// Selects which row images of an event are applied.
///
/// Images at `offset`, `offset + stride`, `offset + 2 * stride` and so on are selected. Update
/// events interleave old and new images, so selecting the new images uses offset 1 and stride 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSelection {
    pub offset: usize,
    pub stride: usize,
}

impl RowSelection {
    /// Every image.
    pub const ALL: RowSelection = RowSelection {
        offset: 0,
        stride: 1,
    };

    /// The new image of every `[old, new]` pair.
    pub const NEW_IMAGES: RowSelection = RowSelection {
        offset: 1,
        stride: 2,
    };

    pub fn select<'a>(&self, rows: &'a [RowImage]) -> impl Iterator<Item = &'a RowImage> + 'a {
        rows.iter().skip(self.offset).step_by(self.stride.max(1))
    }
}
