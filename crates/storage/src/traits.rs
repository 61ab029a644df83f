use bulkedit_core::{FieldSet, ModelSchema, Record, RecordId};

use crate::error::StorageError;

/// Rejection raised by a lifecycle hook before a record is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Record-level side effects run around every per-record write.
///
/// Set-based updates never invoke hooks.
pub trait LifecycleHook {
    /// Runs before the record is written. May adjust derived fields or
    /// reject the write.
    fn before_write(
        &mut self,
        _schema: &ModelSchema,
        _record: &mut Record,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the record has been written and marked clean.
    fn after_write(&mut self, _schema: &ModelSchema, _record: &Record) {}
}

/// Persistence API the bulk editor writes through.
pub trait RecordStore {
    fn load_by_id(
        &self,
        schema: &ModelSchema,
        id: RecordId,
    ) -> Result<Option<Record>, StorageError>;

    /// Write one record, running lifecycle hooks. Inserts when the record has
    /// no id yet. Returns the record's id.
    fn persist(
        &mut self,
        schema: &ModelSchema,
        record: &mut Record,
    ) -> Result<RecordId, StorageError>;

    /// Apply `fields` to every id in one statement, bypassing hooks. Returns the
    /// number of rows whose stored values actually changed.
    fn execute_set_update(
        &mut self,
        schema: &ModelSchema,
        fields: &FieldSet,
        ids: &[RecordId],
    ) -> Result<u64, StorageError>;
}
