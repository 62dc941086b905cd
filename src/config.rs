use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const ENV_DATABASE: &str = "FOOD_DIARY_DB";
pub const ENV_BUSY_TIMEOUT_MS: &str = "FOOD_DIARY_BUSY_TIMEOUT_MS";
pub const ENV_VERIFY_ORDERING: &str = "FOOD_DIARY_VERIFY_ORDERING";
pub const ENV_CONFLICT_RETRIES: &str = "FOOD_DIARY_CONFLICT_RETRIES";

const DEFAULT_DATABASE: &str = "food-diary.db";

/// Runtime configuration for the diary store and note lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiaryConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// How long a unit of work waits for the write lock before reporting a
    /// concurrency conflict
    pub busy_timeout_ms: u64,
    /// Re-read every touched group before commit and reject the mutation if
    /// its ordering is not contiguous
    pub verify_ordering: bool,
    /// Extra attempts the CLI makes after a concurrency conflict
    pub conflict_retries: u32,
}

impl Default for DiaryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE),
            busy_timeout_ms: 2_000,
            verify_ordering: true,
            conflict_retries: 2,
        }
    }
}

impl DiaryConfig {
    pub fn with_path(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Self::default()
        }
    }

    /// Build a config from `FOOD_DIARY_*` environment variables, falling back
    /// to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env::var(ENV_DATABASE)
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            busy_timeout_ms: try_load(ENV_BUSY_TIMEOUT_MS, defaults.busy_timeout_ms),
            verify_ordering: try_load(ENV_VERIFY_ORDERING, defaults.verify_ordering),
            conflict_retries: try_load(ENV_CONFLICT_RETRIES, defaults.conflict_retries),
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
        Err(_) => {
            debug!("{key} not set, using default: {default}");
            default
        }
    }
}
