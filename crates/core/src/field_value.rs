use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b).is_eq(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Whether this value can be stored in a column of `field_type`.
    pub fn fits(&self, field_type: FieldType) -> bool {
        matches!(
            (self, field_type),
            (Self::Null, _)
                | (Self::Text(_), FieldType::Text)
                | (Self::Integer(_), FieldType::Integer)
                | (Self::Float(_), FieldType::Float)
                | (Self::Boolean(_), FieldType::Boolean)
                | (Self::Date(_), FieldType::Date)
        )
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        FieldValue::Date(d)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
        }
    }

    /// SQL column affinity used when the model table is created.
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Date => "TEXT",
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Float => "REAL",
        }
    }

    /// Coerce a raw submitted form string into a typed value.
    ///
    /// An empty (or all-whitespace) string is `Null` for every type, so an
    /// empty form input matches a field that was never set.
    pub fn parse_raw(&self, field: &str, raw: &str) -> Result<FieldValue, CoreError> {
        let invalid = || CoreError::InvalidValue {
            field: field.to_string(),
            value: raw.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Null);
        }
        match self {
            Self::Text => Ok(FieldValue::Text(raw.to_string())),
            Self::Integer => trimmed.parse().map(FieldValue::Integer).map_err(|_| invalid()),
            Self::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(FieldValue::Float)
                .ok_or_else(invalid),
            Self::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Ok(FieldValue::Boolean(true)),
                "0" | "false" | "off" | "no" => Ok(FieldValue::Boolean(false)),
                _ => Err(invalid()),
            },
            Self::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(FieldValue::Date)
                .map_err(|_| invalid()),
        }
    }
}
