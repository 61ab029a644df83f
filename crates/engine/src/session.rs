use bulkedit_core::{ForceApplyRule, ModelSchema, Record, RecordId, SessionId};

/// An editable field together with its always-apply checkbox key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub checkbox: String,
}

/// State of one bulk edit, from opening the form to applying the submission.
///
/// The template starts as a fresh record of the model; the submission is
/// saved into it and its changes become the values written to every target.
#[derive(Debug, Clone)]
pub struct BulkEditSession {
    id: SessionId,
    schema: ModelSchema,
    targets: Vec<RecordId>,
    template: Record,
    back_link: Option<String>,
}

impl BulkEditSession {
    pub fn new(schema: &ModelSchema, targets: Vec<RecordId>) -> Self {
        Self {
            id: SessionId::new(),
            schema: schema.clone(),
            targets,
            template: Record::new(schema),
            back_link: None,
        }
    }

    /// Link to the listing the edit was opened from. Any query string is dropped.
    pub fn with_back_link(mut self, link: &str) -> Self {
        let path = link.split('?').next().unwrap_or_default();
        self.back_link = (!path.is_empty()).then(|| path.to_string());
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn targets(&self) -> &[RecordId] {
        &self.targets
    }

    pub fn template(&self) -> &Record {
        &self.template
    }

    pub(crate) fn template_mut(&mut self) -> &mut Record {
        &mut self.template
    }

    pub fn back_link(&self) -> Option<&str> {
        self.back_link.as_deref()
    }

    pub fn header_text(&self) -> String {
        let count = self.targets.len() as u64;
        format!("Editing {count} {}", self.schema.display_name(count))
    }

    /// Persisted fields offered on the edit form, in schema order.
    pub fn form_fields(&self, rule: &ForceApplyRule) -> Vec<FormField> {
        self.schema
            .persisted_fields()
            .map(|f| FormField {
                name: f.name.clone(),
                checkbox: rule.checkbox_name(&f.name),
            })
            .collect()
    }
}
