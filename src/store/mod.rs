mod sqlite_store;

pub use sqlite_store::{DiaryStore, UnitOfWork};

use crate::entity::{GroupKey, Note};
use crate::error::Result;
use crate::ordering::OrderingChange;

/// Read access to the ordering state of note groups.
pub trait PositionStore {
    /// Every note of the group, ascending by display order.
    fn group_members(&self, key: &GroupKey) -> Result<Vec<Note>>;

    /// Notes of the group at or above `from`, ascending by display order.
    fn group_tail(&self, key: &GroupKey, from: u32) -> Result<Vec<Note>>;

    /// Highest display order in the group, `None` when the group is empty.
    fn max_display_order(&self, key: &GroupKey) -> Result<Option<u32>>;

    /// Number of notes in a contiguous group.
    fn group_size(&self, key: &GroupKey) -> Result<u32> {
        Ok(self.max_display_order(key)?.map_or(0, |max| max + 1))
    }
}

/// The only write path for `display_order` and for moving a note between
/// meal groups. Implemented by [`UnitOfWork`] and used solely by the
/// lifecycle coordinator.
pub(crate) trait PositionMutator {
    /// Writes every change and returns the number of rows updated.
    fn apply_ordering_changes(&self, changes: &[OrderingChange]) -> Result<usize>;
}
