use std::cell::RefCell;
use std::rc::Rc;

use bulkedit_core::{FieldValue, ModelSchema, Record, RecordId};
use bulkedit_storage::{HookError, LifecycleHook};

/// Records the id of every record that finished a per-record write.
#[derive(Debug, Clone, Default)]
pub struct WriteLog(Rc<RefCell<Vec<RecordId>>>);

impl WriteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> Vec<RecordId> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl LifecycleHook for WriteLog {
    fn after_write(&mut self, _schema: &ModelSchema, record: &Record) {
        if let Some(id) = record.id() {
            self.0.borrow_mut().push(id);
        }
    }
}

/// Keeps `Slug` derived from `Title` on every per-record write.
pub struct SlugHook;

impl LifecycleHook for SlugHook {
    fn before_write(&mut self, schema: &ModelSchema, record: &mut Record) -> Result<(), HookError> {
        if !schema.has_persisted_field("Slug") {
            return Ok(());
        }
        let slug = match record.get("Title").and_then(FieldValue::as_text) {
            Some(title) => FieldValue::Text(slugify(title)),
            None => FieldValue::Null,
        };
        record.set("Slug", slug);
        Ok(())
    }
}

fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Treats articles with more than the given view count as locked.
pub struct ViewsLimit(pub i64);

impl LifecycleHook for ViewsLimit {
    fn before_write(
        &mut self,
        _schema: &ModelSchema,
        record: &mut Record,
    ) -> Result<(), HookError> {
        match record.get("Views").and_then(FieldValue::as_integer) {
            Some(views) if views > self.0 => Err(HookError::new(format!(
                "article has {views} views and is locked"
            ))),
            _ => Ok(()),
        }
    }
}
