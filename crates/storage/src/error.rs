use bulkedit_core::RecordId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("model not installed: {0}")]
    UnknownModel(String),

    #[error("validation failed: {message}")]
    Validation {
        record: Option<RecordId>,
        message: String,
    },

    #[error("core error: {0}")]
    Core(#[from] bulkedit_core::CoreError),
}

impl StorageError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
