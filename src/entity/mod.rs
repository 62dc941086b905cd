mod meal;
mod note;
mod page;
mod product;

pub use meal::MealType;
pub use note::{Note, NoteDraft, NoteEdit};
pub use page::Page;
pub use product::Product;

use serde::{Deserialize, Serialize};

/// Identifies an ordering group: every note of one page sharing a meal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub page_id: i64,
    pub meal_type: MealType,
}

impl GroupKey {
    pub fn new(page_id: i64, meal_type: MealType) -> Self {
        Self { page_id, meal_type }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} / {}", self.page_id, self.meal_type)
    }
}
