use rusqlite::ErrorCode;
use thiserror::Error;

use crate::entity::MealType;

#[derive(Error, Debug)]
pub enum DiaryError {
    /// Malformed or semantically invalid request. `key` names the offending
    /// field and is empty when the failure concerns the request as a whole.
    #[error("{}", validation_display(.key, .message))]
    Validation { key: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrent modification, retry the request: {0}")]
    ConcurrencyConflict(String),

    #[error("Ordering of page {page_id} ({meal_type}) is corrupted: found {found:?}")]
    OrderingCorrupted {
        page_id: i64,
        meal_type: MealType,
        found: Vec<u32>,
    },

    #[error("Mutation cancelled before any change was applied")]
    Cancelled,

    #[error("Storage error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn validation_display(key: &str, message: &str) -> String {
    if key.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", key, message)
    }
}

impl DiaryError {
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        DiaryError::Validation {
            key: key.into(),
            message: message.into(),
        }
    }

    /// True when retrying the whole mutation against fresh state may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DiaryError::ConcurrencyConflict(_))
    }
}

impl From<rusqlite::Error> for DiaryError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                DiaryError::ConcurrencyConflict(e.to_string())
            }
            _ => DiaryError::Store(format!("SQLite error: {}", e)),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_with_key() {
        let err = DiaryError::validation("ProductId", "Selected product not found");
        assert_eq!(err.to_string(), "ProductId: Selected product not found");
    }

    #[test]
    fn test_validation_display_without_key() {
        let err = DiaryError::validation("", "Note cannot be moved to the specified position");
        assert_eq!(
            err.to_string(),
            "Note cannot be moved to the specified position"
        );
    }

    #[test]
    fn test_busy_maps_to_conflict() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = DiaryError::from(busy);
        assert!(err.is_transient());
    }

    #[test]
    fn test_other_sqlite_errors_are_store_failures() {
        let err = DiaryError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, DiaryError::Store(_)));
        assert!(!err.is_transient());
    }
}
