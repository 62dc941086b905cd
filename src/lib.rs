pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod ordering;
pub mod store;

pub use config::DiaryConfig;
pub use error::{DiaryError, Result};
pub use lifecycle::{MoveRequest, MutationReport, NoteLifecycle};
pub use store::{DiaryStore, PositionStore};
