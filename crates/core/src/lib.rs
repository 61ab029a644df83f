pub mod error;
pub mod field_value;
pub mod ids;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod submission;

pub use error::CoreError;
pub use field_value::{FieldType, FieldValue};
pub use ids::*;
pub use reconcile::{BaseNameRule, FieldSet, ForceApplyRule};
pub use record::{FieldChange, Record};
pub use schema::{FieldDef, FieldStorage, ModelSchema};
pub use submission::Submission;
