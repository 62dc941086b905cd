// src/entity/note.rs
use serde::{Deserialize, Serialize};

use super::{GroupKey, MealType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub page_id: i64,
    pub meal_type: MealType,
    pub product_id: i64,
    pub product_quantity: i32,
    pub display_order: u32,
}

impl Note {
    pub fn group(&self) -> GroupKey {
        GroupKey::new(self.page_id, self.meal_type)
    }
}

/// Payload for creating a note. The display order is always assigned by the
/// lifecycle coordinator, so it is not part of the draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub page_id: i64,
    pub meal_type: MealType,
    pub product_id: i64,
    pub product_quantity: i32,
}

impl NoteDraft {
    pub fn group(&self) -> GroupKey {
        GroupKey::new(self.page_id, self.meal_type)
    }
}

/// Fields an edit may change. Page, meal type and display order are not
/// editable through this path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEdit {
    pub product_id: i64,
    pub product_quantity: i32,
}
