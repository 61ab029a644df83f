use bulkedit_core::{CoreError, FieldType, FieldValue, ModelSchema, Record, RecordId};
use bulkedit_engine::{BulkEditConfig, BulkEditor};
use bulkedit_storage::{LifecycleHook, RecordStore, SqliteStore, StorageError};
use tracing_subscriber::EnvFilter;

use crate::hooks::{SlugHook, WriteLog};
use crate::store::{CallCounts, CountingStore};

/// Route `tracing` output to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The fixture model used across the integration tests.
pub fn article_schema() -> Result<ModelSchema, CoreError> {
    ModelSchema::builder("Article")
        .table("articles")
        .display_names("Article", "Articles")
        .field("Title", FieldType::Text)
        .required_field("Status", FieldType::Text, FieldValue::Text("Draft".into()))
        .field("Publish", FieldType::Boolean)
        .field("Publish_Date", FieldType::Date)
        .field("Views", FieldType::Integer)
        .field("Slug", FieldType::Text)
        .virtual_field("Summary", FieldType::Text)
        .build()
}

/// An in-memory site with the article model installed, a slug hook and a
/// write log, behind a call-counting store.
pub struct TestSite {
    pub schema: ModelSchema,
    pub editor: BulkEditor<CountingStore<SqliteStore>>,
    pub writes: WriteLog,
    pub calls: CallCounts,
}

impl TestSite {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_config(BulkEditConfig::default())
    }

    pub fn with_config(config: BulkEditConfig) -> Result<Self, StorageError> {
        init_tracing();
        let schema = article_schema()?;
        let mut store = SqliteStore::open_in_memory()?;
        store.install_model(&schema)?;

        let writes = WriteLog::new();
        store.add_hook(Box::new(SlugHook));
        store.add_hook(Box::new(writes.clone()));

        let store = CountingStore::new(store);
        let calls = store.counts();
        Ok(Self {
            schema,
            editor: BulkEditor::with_config(store, config),
            writes,
            calls,
        })
    }

    fn sqlite(&self) -> &SqliteStore {
        self.editor.store().inner()
    }

    fn sqlite_mut(&mut self) -> &mut SqliteStore {
        self.editor.store_mut().inner_mut()
    }

    pub fn add_hook(&mut self, hook: Box<dyn LifecycleHook>) {
        self.sqlite_mut().add_hook(hook);
    }

    /// Insert an article with the given fields, bypassing the call counters.
    pub fn create_article(
        &mut self,
        fields: Vec<(&str, FieldValue)>,
    ) -> Result<RecordId, StorageError> {
        let schema = self.schema.clone();
        let mut record = Record::new(&schema);
        for (field, value) in fields {
            record.set(field, value);
        }
        self.sqlite_mut().persist(&schema, &mut record)
    }

    /// Insert `count` articles titled "Article N" and return their ids.
    pub fn seed(&mut self, count: usize) -> Result<Vec<RecordId>, StorageError> {
        (1..=count)
            .map(|n| {
                let title = FieldValue::Text(format!("Article {n}"));
                self.create_article(vec![("Title", title)])
            })
            .collect()
    }

    /// Overwrite fields on a stored article, running hooks but bypassing the
    /// call counters.
    pub fn update_article(
        &mut self,
        id: RecordId,
        fields: Vec<(&str, FieldValue)>,
    ) -> Result<(), StorageError> {
        let schema = self.schema.clone();
        let Some(mut record) = self.sqlite().load_by_id(&schema, id)? else {
            return Err(StorageError::NotFound(format!("article {id}")));
        };
        for (field, value) in fields {
            record.set(field, value);
        }
        self.sqlite_mut().persist(&schema, &mut record)?;
        Ok(())
    }

    pub fn remove(&self, id: RecordId) -> Result<(), StorageError> {
        self.sqlite()
            .conn()
            .execute("DELETE FROM articles WHERE id = ?1", [id.get()])?;
        Ok(())
    }

    pub fn load(&self, id: RecordId) -> Result<Option<Record>, StorageError> {
        self.sqlite().load_by_id(&self.schema, id)
    }

    pub fn field(&self, id: RecordId, field: &str) -> Result<Option<FieldValue>, StorageError> {
        Ok(self.load(id)?.and_then(|r| r.get(field).cloned()))
    }

    /// Forget writes and calls made while setting up a test.
    pub fn reset_observers(&self) {
        self.writes.clear();
        self.calls.reset();
    }
}
