use bulkedit_core::{CoreError, RecordId};
use bulkedit_storage::StorageError;
use thiserror::Error;

use crate::apply::ApplyReport;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A per-record apply stopped at `failed`. `report` covers the targets
    /// processed before it: records in `report.updated` were already written
    /// and stay written.
    #[error(
        "record {failed} failed after {} successful writes: {source}",
        .report.updated.len()
    )]
    PartialApply {
        report: Box<ApplyReport>,
        failed: RecordId,
        #[source]
        source: StorageError,
    },
}

impl EngineError {
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Storage(e) | Self::PartialApply { source: e, .. } => e.is_validation(),
            Self::Core(CoreError::InvalidValue { .. }) => true,
            _ => false,
        }
    }
}
