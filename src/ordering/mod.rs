//! Pure display-order arithmetic for note groups.
//!
//! Every function here works on an ordered view of one or more groups
//! (ascending `display_order`) and returns the list of ordering changes needed
//! to keep each group contiguous: a group of `n` notes always holds exactly
//! the positions `0..n`. Only notes whose ordering actually changes appear in
//! a change list, so callers can apply the result verbatim.
//!
//! Nothing in this module performs I/O or fails. Move targets must be checked
//! with [`validate_move_target`] before [`relocate_on_move`] is called.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{GroupKey, MealType, Note};

/// A note's identity and current position inside its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub note_id: i64,
    pub display_order: u32,
}

impl Slot {
    pub fn new(note_id: i64, display_order: u32) -> Self {
        Self {
            note_id,
            display_order,
        }
    }
}

impl From<&Note> for Slot {
    fn from(note: &Note) -> Self {
        Self::new(note.id, note.display_order)
    }
}

/// New ordering fields for one note. `meal_type` is set only when the note
/// changes group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderingChange {
    pub note_id: i64,
    pub display_order: u32,
    pub meal_type: Option<MealType>,
}

impl OrderingChange {
    fn reorder(note_id: i64, display_order: u32) -> Self {
        Self {
            note_id,
            display_order,
            meal_type: None,
        }
    }
}

/// Survivors of one group together with the positions removed from it.
#[derive(Debug, Clone, Default)]
pub struct GroupCompaction {
    pub survivors: Vec<Slot>,
    pub deleted_positions: Vec<u32>,
}

/// Where a move takes place.
#[derive(Debug, Clone, Copy)]
pub enum MoveScope<'a> {
    /// Source and destination are the same group.
    Within(&'a [Slot]),
    /// The note leaves `source` and enters `dest` under `dest_meal`.
    Across {
        source: &'a [Slot],
        dest: &'a [Slot],
        dest_meal: MealType,
    },
}

/// Position for a note appended to a group currently holding `group_size`
/// notes.
pub fn assign_on_create(group_size: u32) -> u32 {
    group_size
}

/// Closes the gap left by a single deleted note.
pub fn compact_on_delete(survivors: &[Slot], deleted_position: u32) -> Vec<OrderingChange> {
    compact_group(survivors, &[deleted_position])
}

/// Compacts every group touched by a batch delete.
///
/// Each group is computed from its own survivors and deleted positions only;
/// the per-group results are then concatenated in key order.
pub fn compact_on_batch_delete(
    groups: &BTreeMap<GroupKey, GroupCompaction>,
) -> Vec<OrderingChange> {
    groups
        .values()
        .flat_map(|group| compact_group(&group.survivors, &group.deleted_positions))
        .collect()
}

/// A survivor moves down by the number of deleted positions strictly below it.
fn compact_group(survivors: &[Slot], deleted_positions: &[u32]) -> Vec<OrderingChange> {
    let mut deleted = deleted_positions.to_vec();
    deleted.sort_unstable();
    deleted.dedup();

    survivors
        .iter()
        .filter_map(|slot| {
            let shift = deleted.partition_point(|&d| d < slot.display_order) as u32;
            (shift > 0).then(|| OrderingChange::reorder(slot.note_id, slot.display_order - shift))
        })
        .collect()
}

/// Checks a requested move position against the destination group.
///
/// `dest_group_size` must not count the moving note itself, so for a move
/// inside one group it is the group size minus one. Position
/// `dest_group_size` means "append".
pub fn validate_move_target(dest_group_size: u32, requested_position: i64) -> bool {
    requested_position >= 0 && requested_position <= i64::from(dest_group_size)
}

/// Computes the ordering changes for moving `moving` to `requested_position`.
///
/// Slices may include the moving note; it is recognised by id and skipped.
pub fn relocate_on_move(
    scope: MoveScope<'_>,
    moving: Slot,
    requested_position: u32,
) -> Vec<OrderingChange> {
    match scope {
        MoveScope::Within(members) => reinsert(members, moving, requested_position),
        MoveScope::Across {
            source,
            dest,
            dest_meal,
        } => {
            let mut changes: Vec<OrderingChange> = source
                .iter()
                .filter(|slot| slot.note_id != moving.note_id)
                .filter(|slot| slot.display_order > moving.display_order)
                .map(|slot| OrderingChange::reorder(slot.note_id, slot.display_order - 1))
                .collect();

            changes.extend(
                dest.iter()
                    .filter(|slot| slot.note_id != moving.note_id)
                    .filter(|slot| slot.display_order >= requested_position)
                    .map(|slot| OrderingChange::reorder(slot.note_id, slot.display_order + 1)),
            );

            changes.push(OrderingChange {
                note_id: moving.note_id,
                display_order: requested_position,
                meal_type: Some(dest_meal),
            });
            changes
        }
    }
}

/// Same-group move: only members between the old and new slot shift, one
/// step against the direction of travel.
fn reinsert(members: &[Slot], moving: Slot, target: u32) -> Vec<OrderingChange> {
    let from = moving.display_order;
    if from == target {
        return Vec::new();
    }

    let mut changes: Vec<OrderingChange> = members
        .iter()
        .filter(|slot| slot.note_id != moving.note_id)
        .filter_map(|slot| {
            let pos = slot.display_order;
            if from < target && pos > from && pos <= target {
                Some(OrderingChange::reorder(slot.note_id, pos - 1))
            } else if target < from && pos >= target && pos < from {
                Some(OrderingChange::reorder(slot.note_id, pos + 1))
            } else {
                None
            }
        })
        .collect();

    changes.push(OrderingChange::reorder(moving.note_id, target));
    changes
}

/// True when `positions` is exactly `0..positions.len()` in some order.
pub fn is_contiguous(positions: &[u32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, &position)| position as usize == index)
}
