use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use rusqlite::types::{ToSql, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use bulkedit_core::{
    CoreError, FieldSet, FieldType, FieldValue, ModelSchema, Record, RecordId,
    field_value::DATE_FORMAT,
};

use crate::error::StorageError;
use crate::schema::{create_table_sql, quote_ident};
use crate::traits::{LifecycleHook, RecordStore};

fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Integer(n) => Value::Integer(*n),
        FieldValue::Float(f) => Value::Real(*f),
        FieldValue::Boolean(b) => Value::Integer(i64::from(*b)),
        FieldValue::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
    }
}

fn from_sql(
    field: &str,
    field_type: FieldType,
    value: ValueRef<'_>,
) -> Result<FieldValue, StorageError> {
    let mismatch = || {
        StorageError::Serialization(format!(
            "column {field} does not hold a {}",
            field_type.as_str()
        ))
    };
    match (field_type, value) {
        (_, ValueRef::Null) => Ok(FieldValue::Null),
        (FieldType::Text, ValueRef::Text(bytes)) => std::str::from_utf8(bytes)
            .map(|s| FieldValue::Text(s.to_string()))
            .map_err(|e| StorageError::Serialization(e.to_string())),
        (FieldType::Integer, ValueRef::Integer(n)) => Ok(FieldValue::Integer(n)),
        (FieldType::Float, ValueRef::Real(f)) => Ok(FieldValue::Float(f)),
        (FieldType::Float, ValueRef::Integer(n)) => Ok(FieldValue::Float(n as f64)),
        (FieldType::Boolean, ValueRef::Integer(n)) => Ok(FieldValue::Boolean(n != 0)),
        (FieldType::Date, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            Ok(FieldType::Date.parse_raw(field, text)?)
        }
        _ => Err(mismatch()),
    }
}

/// Reject values a column cannot hold before they reach SQLite, which would
/// otherwise store them under its loose type affinity.
fn check_value(
    schema: &ModelSchema,
    field: &str,
    value: &FieldValue,
) -> Result<(), StorageError> {
    let def = schema
        .field(field)
        .filter(|f| f.is_persisted())
        .ok_or_else(|| CoreError::NotPersisted(field.to_string()))?;
    if !value.fits(def.field_type) {
        return Err(StorageError::Validation {
            record: None,
            message: format!("{field} expects a {} value", def.field_type.as_str()),
        });
    }
    // SQLite binds NaN as NULL, so the row would never read back equal.
    if matches!(value, FieldValue::Float(f) if !f.is_finite()) {
        return Err(StorageError::Validation {
            record: None,
            message: format!("{field} must be a finite number"),
        });
    }
    if def.required && value.is_null() {
        return Err(StorageError::Validation {
            record: None,
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

fn constraint_to_validation(err: rusqlite::Error, record: Option<RecordId>) -> StorageError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref msg)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::Validation {
                record,
                message: msg.clone().unwrap_or_else(|| failure.to_string()),
            }
        }
        other => StorageError::Sqlite(other),
    }
}

pub struct SqliteStore {
    conn: Connection,
    installed: BTreeSet<String>,
    hooks: Vec<Box<dyn LifecycleHook>>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        rusqlite::vtab::array::load_module(&conn)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            installed: BTreeSet::new(),
            hooks: Vec::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        rusqlite::vtab::array::load_module(&conn)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self {
            conn,
            installed: BTreeSet::new(),
            hooks: Vec::new(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Create the model's table if missing and accept records of that model.
    pub fn install_model(&mut self, schema: &ModelSchema) -> Result<(), StorageError> {
        self.conn.execute_batch(&create_table_sql(schema))?;
        self.installed.insert(schema.name().to_string());
        Ok(())
    }

    pub fn add_hook(&mut self, hook: Box<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn count(&self, schema: &ModelSchema) -> Result<u64, StorageError> {
        self.ensure_installed(schema)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(schema.table()));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn ensure_installed(&self, schema: &ModelSchema) -> Result<(), StorageError> {
        if self.installed.contains(schema.name()) {
            Ok(())
        } else {
            Err(StorageError::UnknownModel(schema.name().to_string()))
        }
    }

    fn insert(&self, schema: &ModelSchema, record: &Record) -> Result<RecordId, StorageError> {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for field in schema.persisted_fields() {
            let value = record.get(&field.name).unwrap_or(&field.default);
            check_value(schema, &field.name, value)?;
            columns.push(quote_ident(&field.name));
            values.push(to_sql(value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(schema.table()))
        } else {
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{i}")).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(schema.table()),
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        self.conn
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|e| constraint_to_validation(e, None))?;
        Ok(RecordId::new(self.conn.last_insert_rowid()))
    }

    fn update_changed(
        &self,
        schema: &ModelSchema,
        id: RecordId,
        record: &Record,
    ) -> Result<(), StorageError> {
        let changes: Vec<(String, FieldValue)> = record
            .changed_fields()
            .into_iter()
            .filter(|(field, _)| schema.has_persisted_field(field))
            .map(|(field, change)| (field, change.after))
            .collect();
        if changes.is_empty() {
            return Ok(());
        }

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (i, (field, value)) in changes.iter().enumerate() {
            check_value(schema, field, value).map_err(|e| with_record(e, id))?;
            assignments.push(format!("{} = ?{}", quote_ident(field), i + 1));
            values.push(to_sql(value));
        }
        values.push(Value::Integer(id.get()));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(schema.table()),
            assignments.join(", "),
            quote_ident("id"),
            values.len()
        );
        self.conn
            .execute(&sql, rusqlite::params_from_iter(values))
            .map_err(|e| constraint_to_validation(e, Some(id)))?;
        Ok(())
    }
}

fn with_record(err: StorageError, id: RecordId) -> StorageError {
    match err {
        StorageError::Validation { message, .. } => StorageError::Validation {
            record: Some(id),
            message,
        },
        other => other,
    }
}

impl RecordStore for SqliteStore {
    fn load_by_id(
        &self,
        schema: &ModelSchema,
        id: RecordId,
    ) -> Result<Option<Record>, StorageError> {
        self.ensure_installed(schema)?;
        let fields: Vec<_> = schema.persisted_fields().collect();
        let mut columns = vec![quote_ident("id")];
        columns.extend(fields.iter().map(|f| quote_ident(&f.name)));
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            columns.join(", "),
            quote_ident(schema.table()),
            quote_ident("id")
        );

        let row: Option<Vec<Value>> = self
            .conn
            .query_row(&sql, rusqlite::params![id.get()], |row| {
                (1..=fields.len())
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .optional()?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut values = BTreeMap::new();
        for (field, raw) in fields.iter().zip(row.iter()) {
            let value = from_sql(&field.name, field.field_type, ValueRef::from(raw))?;
            values.insert(field.name.clone(), value);
        }
        Ok(Some(Record::loaded(id, values)))
    }

    fn persist(
        &mut self,
        schema: &ModelSchema,
        record: &mut Record,
    ) -> Result<RecordId, StorageError> {
        self.ensure_installed(schema)?;
        for hook in &mut self.hooks {
            hook.before_write(schema, record).map_err(|e| StorageError::Validation {
                record: record.id(),
                message: e.0,
            })?;
        }

        let id = match record.id() {
            Some(id) => {
                self.update_changed(schema, id, record)?;
                id
            }
            None => self.insert(schema, record)?,
        };
        debug!(model = schema.name(), %id, "record written");
        record.mark_clean(id);

        for hook in &mut self.hooks {
            hook.after_write(schema, record);
        }
        Ok(id)
    }

    fn execute_set_update(
        &mut self,
        schema: &ModelSchema,
        fields: &FieldSet,
        ids: &[RecordId],
    ) -> Result<u64, StorageError> {
        self.ensure_installed(schema)?;
        if fields.is_empty() || ids.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        let mut differs = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();
        for (i, (field, value)) in fields.iter().enumerate() {
            check_value(schema, field, value)?;
            let column = quote_ident(field);
            assignments.push(format!("{column} = ?{}", i + 1));
            differs.push(format!("{column} IS NOT ?{}", i + 1));
            values.push(Box::new(to_sql(value)));
        }
        // The whole target list binds as one array parameter, so its length
        // is not bounded by SQLITE_MAX_VARIABLE_NUMBER.
        let targets: Vec<Value> = ids.iter().map(|id| Value::Integer(id.get())).collect();
        values.push(Box::new(Rc::new(targets)));

        // Rows already holding every value are excluded so the affected count
        // only covers rows whose stored values change.
        let sql = format!(
            "UPDATE {} SET {} WHERE {} IN rarray(?{}) AND ({})",
            quote_ident(schema.table()),
            assignments.join(", "),
            quote_ident("id"),
            values.len(),
            differs.join(" OR ")
        );
        debug!(
            model = schema.name(),
            fields = fields.len(),
            ids = ids.len(),
            "set update"
        );
        let affected = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(values.iter()))
            .map_err(|e| constraint_to_validation(e, None))?;
        Ok(affected as u64)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("installed", &self.installed)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
