use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::field_value::{FieldType, FieldValue};

/// Whether a field has a backing column or is computed in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStorage {
    Persisted,
    Virtual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub storage: FieldStorage,
    pub default: FieldValue,
    pub required: bool,
}

impl FieldDef {
    pub fn is_persisted(&self) -> bool {
        self.storage == FieldStorage::Persisted
    }
}

/// Schema of one model type: its table, display names and ordered fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSchema {
    name: String,
    table: String,
    singular_name: String,
    plural_name: String,
    fields: Vec<FieldDef>,
}

impl ModelSchema {
    pub fn builder(name: &str) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.to_string(),
            table: None,
            singular_name: None,
            plural_name: None,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn singular_name(&self) -> &str {
        &self.singular_name
    }

    pub fn plural_name(&self) -> &str {
        &self.plural_name
    }

    /// Singular name for exactly one record, plural for anything else (zero included).
    pub fn display_name(&self, count: u64) -> &str {
        if count == 1 {
            &self.singular_name
        } else {
            &self.plural_name
        }
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn has_persisted_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(FieldDef::is_persisted)
    }

    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.is_persisted())
    }
}

pub struct ModelSchemaBuilder {
    name: String,
    table: Option<String>,
    singular_name: Option<String>,
    plural_name: Option<String>,
    fields: Vec<FieldDef>,
}

impl ModelSchemaBuilder {
    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn display_names(mut self, singular: &str, plural: &str) -> Self {
        self.singular_name = Some(singular.to_string());
        self.plural_name = Some(plural.to_string());
        self
    }

    pub fn field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            field_type,
            storage: FieldStorage::Persisted,
            default: FieldValue::Null,
            required: false,
        });
        self
    }

    pub fn required_field(
        mut self,
        name: &str,
        field_type: FieldType,
        default: FieldValue,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            field_type,
            storage: FieldStorage::Persisted,
            default,
            required: true,
        });
        self
    }

    pub fn virtual_field(mut self, name: &str, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            field_type,
            storage: FieldStorage::Virtual,
            default: FieldValue::Null,
            required: false,
        });
        self
    }

    pub fn build(self) -> Result<ModelSchema, CoreError> {
        let table = self.table.unwrap_or_else(|| self.name.clone());
        validate_identifier(&self.name)?;
        validate_identifier(&table)?;

        for (i, field) in self.fields.iter().enumerate() {
            validate_identifier(&field.name)?;
            if field.name.eq_ignore_ascii_case("id") {
                return Err(CoreError::InvalidSchema(format!(
                    "field name {} is reserved",
                    field.name
                )));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(CoreError::InvalidSchema(format!(
                    "duplicate field {}",
                    field.name
                )));
            }
            if !field.default.fits(field.field_type) {
                return Err(CoreError::InvalidSchema(format!(
                    "default for {} is not a {}",
                    field.name,
                    field.field_type.as_str()
                )));
            }
        }

        let singular_name = self.singular_name.unwrap_or_else(|| self.name.clone());
        let plural_name = self
            .plural_name
            .unwrap_or_else(|| format!("{singular_name}s"));

        Ok(ModelSchema {
            name: self.name,
            table,
            singular_name,
            plural_name,
            fields: self.fields,
        })
    }
}

/// Names end up as quoted SQL identifiers, so keep them to `[A-Za-z_][A-Za-z0-9_]*`.
fn validate_identifier(name: &str) -> Result<(), CoreError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidSchema(format!("invalid identifier {name:?}")))
    }
}
