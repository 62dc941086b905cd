//! Note lifecycle coordination.
//!
//! [`NoteLifecycle`] is the single authority for ordering writes. Each
//! mutation runs inside one [`UnitOfWork`]:
//!
//! 1. **Validate** the request against fresh state
//! 2. **Load** the smallest ordered slice of each affected group
//! 3. **Compute** the ordering changes with [`crate::ordering`]
//! 4. **Apply** the row changes
//! 5. **Commit**
//!
//! Any error before the commit drops the unit of work, which rolls back
//! everything it wrote. Cancellation is honoured only between Compute and
//! Apply.

use std::collections::{BTreeMap, BTreeSet};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DiaryConfig;
use crate::entity::{GroupKey, MealType, Note, NoteDraft, NoteEdit};
use crate::error::{DiaryError, Result};
use crate::ordering::{self, GroupCompaction, MoveScope, Slot};
use crate::store::{DiaryStore, PositionMutator, PositionStore, UnitOfWork};

pub const PRODUCT_NOT_FOUND: &str = "Selected product not found";
pub const MOVE_REJECTED: &str = "Note cannot be moved to the specified position";
pub const WRONG_DELETE_IDS: &str = "Unable to delete target notes: wrong ids specified";

/// Accepted range for `product_quantity`, in grams.
pub const QUANTITY_RANGE: std::ops::RangeInclusive<i32> = 1..=10_000;

/// Request to move a note to another position, possibly in another meal
/// group of the same page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub note_id: i64,
    pub dest_meal: MealType,
    pub position: i64,
}

/// What a committed deletion or move changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub notes_removed: usize,
    pub ordering_writes: usize,
}

pub struct NoteLifecycle<'s> {
    store: &'s mut DiaryStore,
    verify_ordering: bool,
    cancel: CancellationToken,
}

impl<'s> NoteLifecycle<'s> {
    pub fn new(store: &'s mut DiaryStore, config: &DiaryConfig) -> Self {
        Self {
            store,
            verify_ordering: config.verify_ordering,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `token` to abandon mutations that have not started applying yet.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn get_note(&self, id: i64) -> Result<Note> {
        self.store
            .get_note(id)?
            .ok_or_else(|| DiaryError::NotFound(format!("note {}", id)))
    }

    /// Notes of a page ordered by meal type then display order, optionally
    /// restricted to one meal.
    pub fn notes_for_page(
        &self,
        page_id: i64,
        meal_type: Option<MealType>,
    ) -> Result<Vec<Note>> {
        if self.store.get_page(page_id)?.is_none() {
            return Err(DiaryError::NotFound(format!("page {}", page_id)));
        }
        match meal_type {
            Some(meal) => self.store.notes_for_group(&GroupKey::new(page_id, meal)),
            None => self.store.notes_for_page(page_id),
        }
    }

    /// Append a new note to the end of its meal group.
    pub fn create_note(&mut self, draft: &NoteDraft) -> Result<Note> {
        validate_quantity(draft.product_quantity)?;

        let uow = self.store.begin()?;
        if !uow.page_exists(draft.page_id)? {
            return Err(DiaryError::NotFound(format!("page {}", draft.page_id)));
        }
        ensure_product(&uow, draft.product_id)?;

        let key = draft.group();
        let position = ordering::assign_on_create(uow.group_size(&key)?);

        checkpoint(&self.cancel)?;
        let note = uow.insert_note(draft, position)?;
        verify_groups(&uow, self.verify_ordering, [key])?;
        uow.commit()?;

        info!(note_id = note.id, group = %key, position, "note created");
        Ok(note)
    }

    /// Change product and quantity. Ordering fields are never touched here.
    pub fn edit_note(&mut self, id: i64, edit: &NoteEdit) -> Result<Note> {
        validate_quantity(edit.product_quantity)?;

        let uow = self.store.begin()?;
        let mut note = uow
            .get_note(id)?
            .ok_or_else(|| DiaryError::NotFound(format!("note {}", id)))?;
        ensure_product(&uow, edit.product_id)?;

        checkpoint(&self.cancel)?;
        uow.update_note_contents(id, edit)?;
        uow.commit()?;

        note.product_id = edit.product_id;
        note.product_quantity = edit.product_quantity;
        debug!(note_id = id, "note edited");
        Ok(note)
    }

    /// Delete one note and close the gap it leaves.
    pub fn delete_note(&mut self, id: i64) -> Result<MutationReport> {
        let uow = self.store.begin()?;
        let note = uow
            .get_note(id)?
            .ok_or_else(|| DiaryError::NotFound(format!("note {}", id)))?;
        let key = note.group();

        let survivors: Vec<Slot> = uow
            .group_tail(&key, note.display_order)?
            .iter()
            .filter(|member| member.id != note.id)
            .map(Slot::from)
            .collect();
        let changes = ordering::compact_on_delete(&survivors, note.display_order);

        checkpoint(&self.cancel)?;
        let notes_removed = uow.delete_notes(&[note.id])?;
        let ordering_writes = uow.apply_ordering_changes(&changes)?;
        verify_groups(&uow, self.verify_ordering, [key])?;
        uow.commit()?;

        info!(note_id = id, group = %key, ordering_writes, "note deleted");
        Ok(MutationReport {
            notes_removed,
            ordering_writes,
        })
    }

    /// Delete several notes, possibly spread over many groups. Every id must
    /// resolve or nothing is deleted.
    pub fn delete_notes(&mut self, ids: &[i64]) -> Result<MutationReport> {
        let ids: Vec<i64> = ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Ok(MutationReport::default());
        }

        let uow = self.store.begin()?;
        let notes = uow.notes_by_ids(&ids)?;
        if notes.len() != ids.len() {
            debug!(requested = ids.len(), found = notes.len(), "batch delete rejected");
            return Err(DiaryError::validation("", WRONG_DELETE_IDS));
        }

        let mut deleted_by_group: BTreeMap<GroupKey, Vec<u32>> = BTreeMap::new();
        for note in &notes {
            deleted_by_group
                .entry(note.group())
                .or_default()
                .push(note.display_order);
        }

        let mut groups = BTreeMap::new();
        for (key, deleted_positions) in deleted_by_group {
            let lowest = deleted_positions.iter().copied().min().unwrap_or(0);
            let survivors = uow
                .group_tail(&key, lowest)?
                .iter()
                .filter(|member| ids.binary_search(&member.id).is_err())
                .map(Slot::from)
                .collect();
            groups.insert(
                key,
                GroupCompaction {
                    survivors,
                    deleted_positions,
                },
            );
        }
        let changes = ordering::compact_on_batch_delete(&groups);

        checkpoint(&self.cancel)?;
        let notes_removed = uow.delete_notes(&ids)?;
        let ordering_writes = uow.apply_ordering_changes(&changes)?;
        verify_groups(&uow, self.verify_ordering, groups.keys().copied())?;
        uow.commit()?;

        info!(
            notes_removed,
            groups = groups.len(),
            ordering_writes,
            "notes deleted"
        );
        Ok(MutationReport {
            notes_removed,
            ordering_writes,
        })
    }

    /// Move a note to `request.position` inside `request.dest_meal` of the
    /// same page. Moving a note onto its own position writes nothing.
    pub fn move_note(&mut self, request: &MoveRequest) -> Result<MutationReport> {
        let uow = self.store.begin()?;
        let note = uow
            .get_note(request.note_id)?
            .ok_or_else(|| DiaryError::NotFound(format!("note {}", request.note_id)))?;

        let source = note.group();
        let dest = GroupKey::new(note.page_id, request.dest_meal);
        let same_group = source == dest;

        // The moving note never counts towards the destination ceiling.
        let dest_size = uow
            .max_display_order(&dest)?
            .map_or(0, |max| max + 1)
            .saturating_sub(u32::from(same_group));
        if !ordering::validate_move_target(dest_size, request.position) {
            debug!(
                note_id = note.id,
                requested = request.position,
                dest_size,
                "move rejected"
            );
            return Err(DiaryError::validation("", MOVE_REJECTED));
        }
        let position = request.position as u32;

        let changes = if same_group {
            let members: Vec<Slot> = uow
                .group_tail(&source, note.display_order.min(position))?
                .iter()
                .map(Slot::from)
                .collect();
            ordering::relocate_on_move(MoveScope::Within(&members), Slot::from(&note), position)
        } else {
            let source_tail: Vec<Slot> = uow
                .group_tail(&source, note.display_order)?
                .iter()
                .map(Slot::from)
                .collect();
            let dest_tail: Vec<Slot> = uow
                .group_tail(&dest, position)?
                .iter()
                .map(Slot::from)
                .collect();
            ordering::relocate_on_move(
                MoveScope::Across {
                    source: &source_tail,
                    dest: &dest_tail,
                    dest_meal: request.dest_meal,
                },
                Slot::from(&note),
                position,
            )
        };

        if changes.is_empty() {
            debug!(note_id = note.id, "move onto current position");
            return Ok(MutationReport::default());
        }

        checkpoint(&self.cancel)?;
        let ordering_writes = uow.apply_ordering_changes(&changes)?;
        let touched: BTreeSet<GroupKey> = [source, dest].into_iter().collect();
        verify_groups(&uow, self.verify_ordering, touched)?;
        uow.commit()?;

        info!(
            note_id = note.id,
            from = %source,
            to = %dest,
            position,
            ordering_writes,
            "note moved"
        );
        Ok(MutationReport {
            notes_removed: 0,
            ordering_writes,
        })
    }
}

/// Run `op`, retrying up to `retries` more times while it fails with a
/// transient error.
pub fn with_conflict_retry<T>(retries: u32, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                warn!(attempt, error = %e, "retrying after concurrency conflict");
                thread::sleep(Duration::from_millis(25 * u64::from(attempt)));
            }
            result => return result,
        }
    }
}

fn validate_quantity(quantity: i32) -> Result<()> {
    if QUANTITY_RANGE.contains(&quantity) {
        Ok(())
    } else {
        Err(DiaryError::validation(
            "ProductQuantity",
            format!(
                "Product quantity must be between {} and {}",
                QUANTITY_RANGE.start(),
                QUANTITY_RANGE.end()
            ),
        ))
    }
}

fn ensure_product(uow: &UnitOfWork<'_>, product_id: i64) -> Result<()> {
    if uow.product_exists(product_id)? {
        Ok(())
    } else {
        Err(DiaryError::validation("ProductId", PRODUCT_NOT_FOUND))
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        debug!("mutation cancelled before apply");
        return Err(DiaryError::Cancelled);
    }
    Ok(())
}

fn verify_groups(
    uow: &UnitOfWork<'_>,
    enabled: bool,
    keys: impl IntoIterator<Item = GroupKey>,
) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    for key in keys {
        let found: Vec<u32> = uow
            .group_members(&key)?
            .iter()
            .map(|note| note.display_order)
            .collect();
        if !ordering::is_contiguous(&found) {
            warn!(group = %key, ?found, "ordering check failed, rolling back");
            return Err(DiaryError::OrderingCorrupted {
                page_id: key.page_id,
                meal_type: key.meal_type,
                found,
            });
        }
    }
    Ok(())
}
