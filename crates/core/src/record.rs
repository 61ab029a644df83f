use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::field_value::FieldValue;
use crate::ids::RecordId;
use crate::schema::ModelSchema;

/// Before/after pair for one field whose value differs from the loaded snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub before: FieldValue,
    pub after: FieldValue,
}

/// A record with change tracking against the state it was loaded (or created) in.
#[derive(Debug, Clone)]
pub struct Record {
    id: Option<RecordId>,
    snapshot: BTreeMap<String, FieldValue>,
    values: BTreeMap<String, FieldValue>,
}

impl Record {
    /// A fresh, unsaved record holding every field's default.
    pub fn new(schema: &ModelSchema) -> Self {
        let values: BTreeMap<String, FieldValue> = schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect();
        Self {
            id: None,
            snapshot: values.clone(),
            values,
        }
    }

    /// A record as read from storage; the given values become the snapshot.
    pub fn loaded(id: RecordId, values: BTreeMap<String, FieldValue>) -> Self {
        Self {
            id: Some(id),
            snapshot: values.clone(),
            values,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.values.insert(field.to_string(), value);
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    /// Fields whose current value differs from the snapshot, compared by value.
    pub fn changed_fields(&self) -> BTreeMap<String, FieldChange> {
        self.values
            .iter()
            .filter_map(|(field, after)| {
                let before = self.snapshot.get(field).unwrap_or(&FieldValue::Null);
                (before != after).then(|| {
                    (
                        field.clone(),
                        FieldChange {
                            before: before.clone(),
                            after: after.clone(),
                        },
                    )
                })
            })
            .collect()
    }

    pub fn is_changed(&self) -> bool {
        self.values
            .iter()
            .any(|(field, after)| self.snapshot.get(field).unwrap_or(&FieldValue::Null) != after)
    }

    /// Record the current values as the new snapshot, after a successful write.
    pub fn mark_clean(&mut self, id: RecordId) {
        self.id = Some(id);
        self.snapshot = self.values.clone();
    }
}
