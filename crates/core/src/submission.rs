use std::collections::BTreeMap;

use serde_json::Value;

use crate::CoreError;
use crate::ids::RecordId;
use crate::record::Record;
use crate::schema::ModelSchema;

/// Key that carries the ordered target identifiers.
pub const RECORDS_KEY: &str = "records";

/// Raw submitted bulk-edit form data.
///
/// Ordinary field values and companion checkbox keys live in one flat map;
/// the target identifiers are pulled out of the `records` key in submission
/// order, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    data: BTreeMap<String, String>,
    records: Vec<RecordId>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_records(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.records.extend(ids.into_iter().map(RecordId::new));
        self
    }

    /// Build from form-encoded pairs. `records` and `records[]` may repeat;
    /// for any other repeated key the last value wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut submission = Self::new();
        for (key, value) in pairs {
            let key = key.as_ref();
            if is_records_key(key) {
                submission.records.push(value.as_ref().parse()?);
            } else {
                submission
                    .data
                    .insert(key.to_string(), value.as_ref().to_string());
            }
        }
        Ok(submission)
    }

    /// Build from a JSON object of scalar values with `records` as an array.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(CoreError::Serialization(
                "submission must be a JSON object".into(),
            ));
        };

        let mut submission = Self::new();
        for (key, value) in map {
            if is_records_key(&key) {
                let Value::Array(ids) = value else {
                    return Err(CoreError::Serialization(format!(
                        "{RECORDS_KEY} must be an array"
                    )));
                };
                for id in ids {
                    submission.records.push(json_record_id(&id)?);
                }
                continue;
            }
            let raw = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => String::from(if b { "1" } else { "0" }),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(CoreError::Serialization(format!(
                        "value for {key} must be a scalar"
                    )));
                }
            };
            submission.data.insert(key, raw);
        }
        Ok(submission)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn records(&self) -> &[RecordId] {
        &self.records
    }

    /// Write every submitted schema field (virtual ones included) into `record`,
    /// coercing each raw value by the field's type.
    pub fn save_into(&self, schema: &ModelSchema, record: &mut Record) -> Result<(), CoreError> {
        for field in schema.fields() {
            if let Some(raw) = self.data.get(&field.name) {
                let value = field.field_type.parse_raw(&field.name, raw)?;
                record.set(&field.name, value);
            }
        }
        Ok(())
    }
}

fn is_records_key(key: &str) -> bool {
    key == RECORDS_KEY || key.strip_suffix("[]") == Some(RECORDS_KEY)
}

fn json_record_id(value: &Value) -> Result<RecordId, CoreError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(RecordId::new)
            .ok_or_else(|| CoreError::InvalidRecordId(n.to_string())),
        Value::String(s) => s.parse(),
        other => Err(CoreError::InvalidRecordId(other.to_string())),
    }
}
