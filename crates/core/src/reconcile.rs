//! Reconciling one edited template against the bulk submission.
//!
//! Three pure steps: extract the organic changes from the template record,
//! resolve the fields the operator forced through companion checkboxes, and
//! merge the two into the [`FieldSet`] that gets written to every target.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::CoreError;
use crate::field_value::FieldValue;
use crate::record::Record;
use crate::schema::ModelSchema;
use crate::submission::Submission;

pub const CHECKBOX_SUFFIX: &str = "_UnchangedCheckbox";

/// Final field name → value mapping applied to each target.
///
/// Only persisted schema fields can enter the set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldSet(BTreeMap<String, FieldValue>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` for `field` if the schema persists it. Returns whether
    /// the entry was kept.
    pub fn insert_checked(&mut self, schema: &ModelSchema, field: &str, value: FieldValue) -> bool {
        if !schema.has_persisted_field(field) {
            return false;
        }
        self.0.insert(field.to_string(), value);
        true
    }

    pub fn from_checked<'a>(
        schema: &ModelSchema,
        entries: impl IntoIterator<Item = (&'a str, FieldValue)>,
    ) -> Self {
        let mut set = Self::new();
        for (field, value) in entries {
            set.insert_checked(schema, field, value);
        }
        set
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// How the field name is derived from a force-apply checkbox key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseNameRule {
    /// The first non-empty `_`-separated segment of the key.
    /// `Publish_Date_UnchangedCheckbox` resolves to `Publish`, so fields
    /// containing `_` cannot be forced. Leading and repeated underscores are
    /// skipped: `_Title_UnchangedCheckbox` resolves to `Title`.
    #[default]
    FirstSegment,
    /// The key with the checkbox suffix removed.
    StripSuffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForceApplyRule {
    pub suffix: String,
    pub base_name: BaseNameRule,
}

impl Default for ForceApplyRule {
    fn default() -> Self {
        Self {
            suffix: CHECKBOX_SUFFIX.to_string(),
            base_name: BaseNameRule::default(),
        }
    }
}

impl ForceApplyRule {
    /// Companion checkbox key for `field`.
    pub fn checkbox_name(&self, field: &str) -> String {
        format!("{field}{}", self.suffix)
    }

    /// Field name a checkbox key refers to, or `None` if the key is not a checkbox.
    pub fn base_name<'a>(&self, key: &'a str) -> Option<&'a str> {
        let stripped = key.strip_suffix(self.suffix.as_str())?;
        match self.base_name {
            BaseNameRule::FirstSegment => key.split('_').find(|s| !s.is_empty()),
            BaseNameRule::StripSuffix => Some(stripped),
        }
    }
}

/// Organic changes on the template, restricted to persisted fields.
pub fn extract_changes(schema: &ModelSchema, template: &Record) -> FieldSet {
    let mut set = FieldSet::new();
    for (field, change) in template.changed_fields() {
        set.insert_checked(schema, &field, change.after);
    }
    set
}

/// Values for every field the operator flagged as always-apply.
///
/// The submitted value is used whether or not it differs from the template;
/// a flag without a submitted value forces `Null`. Flags naming anything but a
/// persisted field are dropped.
pub fn resolve_forced(
    schema: &ModelSchema,
    submission: &Submission,
    rule: &ForceApplyRule,
) -> Result<FieldSet, CoreError> {
    let mut set = FieldSet::new();
    for key in submission.keys() {
        let Some(base) = rule.base_name(key) else {
            continue;
        };
        let Some(field) = schema.field(base).filter(|f| f.is_persisted()) else {
            continue;
        };
        let value = match submission.get(base) {
            Some(raw) => field.field_type.parse_raw(base, raw)?,
            None => FieldValue::Null,
        };
        set.insert_checked(schema, base, value);
    }
    Ok(set)
}

/// Union of both sets; a forced value replaces an organic change to the same field.
pub fn merge(changes: FieldSet, forced: FieldSet) -> FieldSet {
    let mut merged = changes;
    merged.0.extend(forced.0);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field_value::FieldType;

    fn schema() -> ModelSchema {
        ModelSchema::builder("Article")
            .required_field("Status", FieldType::Text, FieldValue::Text("Draft".into()))
            .field("Title", FieldType::Text)
            .field("Publish_Date", FieldType::Date)
            .field("Views", FieldType::Integer)
            .virtual_field("Summary", FieldType::Text)
            .build()
            .unwrap()
    }

    #[test]
    fn extract_skips_virtual_and_unchanged_fields() {
        let schema = schema();
        let mut template = Record::new(&schema);
        template.set("Status", "Published".into());
        template.set("Title", FieldValue::Null);
        template.set("Summary", "computed".into());

        let changes = extract_changes(&schema, &template);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("Status"), Some(&FieldValue::Text("Published".into())));
    }

    #[test]
    fn forced_uses_submitted_value_or_null() {
        let schema = schema();
        let submission = Submission::new()
            .with("Title_UnchangedCheckbox", "1")
            .with("Title", "Reviewed")
            .with("Views_UnchangedCheckbox", "1");

        let forced = resolve_forced(&schema, &submission, &ForceApplyRule::default()).unwrap();
        assert_eq!(forced.get("Title"), Some(&FieldValue::Text("Reviewed".into())));
        assert_eq!(forced.get("Views"), Some(&FieldValue::Null));
        assert_eq!(forced.len(), 2);
    }

    #[test]
    fn forced_drops_unknown_and_virtual_fields() {
        let schema = schema();
        let submission = Submission::new()
            .with("Nope_UnchangedCheckbox", "1")
            .with("Summary_UnchangedCheckbox", "1")
            .with("Summary", "x")
            .with("Title_Unchanged", "1");

        let forced = resolve_forced(&schema, &submission, &ForceApplyRule::default()).unwrap();
        assert!(forced.is_empty());
    }

    #[test]
    fn first_segment_truncates_underscored_names() {
        let schema = schema();
        let submission = Submission::new()
            .with("Publish_Date_UnchangedCheckbox", "1")
            .with("Publish_Date", "2024-05-01");

        let forced = resolve_forced(&schema, &submission, &ForceApplyRule::default()).unwrap();
        assert!(forced.is_empty());

        let rule = ForceApplyRule {
            base_name: BaseNameRule::StripSuffix,
            ..ForceApplyRule::default()
        };
        let forced = resolve_forced(&schema, &submission, &rule).unwrap();
        assert!(forced.contains("Publish_Date"));
    }

    #[test]
    fn forced_value_is_coerced() {
        let schema = schema();
        let submission = Submission::new()
            .with("Views_UnchangedCheckbox", "1")
            .with("Views", "abc");
        let err = resolve_forced(&schema, &submission, &ForceApplyRule::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
    }

    #[test]
    fn forced_wins_on_merge() {
        let schema = schema();
        let changes = FieldSet::from_checked(
            &schema,
            [("Status", FieldValue::from("A")), ("Views", FieldValue::Integer(3))],
        );
        let forced = FieldSet::from_checked(&schema, [("Status", FieldValue::from("B"))]);

        let merged = merge(changes, forced);
        assert_eq!(merged.get("Status"), Some(&FieldValue::Text("B".into())));
        assert_eq!(merged.get("Views"), Some(&FieldValue::Integer(3)));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn field_set_rejects_non_persisted() {
        let schema = schema();
        let mut set = FieldSet::new();
        assert!(!set.insert_checked(&schema, "Summary", "x".into()));
        assert!(!set.insert_checked(&schema, "Missing", "x".into()));
        assert!(set.insert_checked(&schema, "Title", "x".into()));
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["Title"]);
    }

    #[test]
    fn checkbox_names_round_trip_without_underscores() {
        let rule = ForceApplyRule::default();
        assert_eq!(rule.checkbox_name("Title"), "Title_UnchangedCheckbox");
        assert_eq!(rule.base_name("Title_UnchangedCheckbox"), Some("Title"));
        assert_eq!(rule.base_name("Title"), None);
    }

    #[test]
    fn first_segment_skips_empty_segments() {
        let rule = ForceApplyRule::default();
        assert_eq!(rule.base_name("_Title_UnchangedCheckbox"), Some("Title"));
        assert_eq!(rule.base_name("__Views__x_UnchangedCheckbox"), Some("Views"));

        let schema = schema();
        let submission = Submission::new()
            .with("_Title_UnchangedCheckbox", "1")
            .with("Title", "Reviewed");
        let forced = resolve_forced(&schema, &submission, &rule).unwrap();
        assert_eq!(forced.get("Title"), Some(&FieldValue::Text("Reviewed".into())));
    }
}
