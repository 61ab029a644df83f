use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid value for field {field}: {value:?}")]
    InvalidValue { field: String, value: String },

    #[error("invalid record id: {0:?}")]
    InvalidRecordId(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("field is not persisted: {0}")]
    NotPersisted(String),
}
