use std::cell::Cell;
use std::rc::Rc;

use bulkedit_core::{FieldSet, ModelSchema, Record, RecordId};
use bulkedit_storage::{RecordStore, StorageError};

/// Number of calls that reached the wrapped store.
#[derive(Debug, Clone, Default)]
pub struct CallCounts {
    loads: Rc<Cell<usize>>,
    persists: Rc<Cell<usize>>,
    set_updates: Rc<Cell<usize>>,
}

impl CallCounts {
    pub fn loads(&self) -> usize {
        self.loads.get()
    }

    pub fn persists(&self) -> usize {
        self.persists.get()
    }

    pub fn set_updates(&self) -> usize {
        self.set_updates.get()
    }

    pub fn total(&self) -> usize {
        self.loads() + self.persists() + self.set_updates()
    }

    pub fn reset(&self) {
        self.loads.set(0);
        self.persists.set(0);
        self.set_updates.set(0);
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// A [`RecordStore`] that counts every call before delegating.
pub struct CountingStore<S> {
    inner: S,
    counts: CallCounts,
}

impl<S: RecordStore> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            counts: CallCounts::default(),
        }
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.clone()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: RecordStore> RecordStore for CountingStore<S> {
    fn load_by_id(
        &self,
        schema: &ModelSchema,
        id: RecordId,
    ) -> Result<Option<Record>, StorageError> {
        bump(&self.counts.loads);
        self.inner.load_by_id(schema, id)
    }

    fn persist(
        &mut self,
        schema: &ModelSchema,
        record: &mut Record,
    ) -> Result<RecordId, StorageError> {
        bump(&self.counts.persists);
        self.inner.persist(schema, record)
    }

    fn execute_set_update(
        &mut self,
        schema: &ModelSchema,
        fields: &FieldSet,
        ids: &[RecordId],
    ) -> Result<u64, StorageError> {
        bump(&self.counts.set_updates);
        self.inner.execute_set_update(schema, fields, ids)
    }
}
