pub mod apply;
pub mod config;
pub mod error;
pub mod session;

pub use apply::{ApplyMode, ApplyReport, apply};
pub use config::BulkEditConfig;
pub use error::EngineError;
pub use session::{BulkEditSession, FormField};

use serde::Serialize;
use tracing::info;

use bulkedit_core::{
    FieldSet, ModelSchema, RecordId, Submission,
    reconcile::{extract_changes, merge, resolve_forced},
};
use bulkedit_storage::RecordStore;

/// What the controller layer gets back from a submission.
#[derive(Debug, Clone, Serialize)]
pub struct BulkEditResult {
    pub writes_count: u64,
    pub display_message: String,
    pub fields: FieldSet,
    pub report: ApplyReport,
}

/// Drives bulk edits against one record store.
pub struct BulkEditor<S: RecordStore> {
    store: S,
    config: BulkEditConfig,
}

impl<S: RecordStore> BulkEditor<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, BulkEditConfig::default())
    }

    pub fn with_config(store: S, config: BulkEditConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BulkEditConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Open an edit over `targets` with a fresh template of `schema`.
    pub fn begin(&self, schema: &ModelSchema, targets: Vec<RecordId>) -> BulkEditSession {
        BulkEditSession::new(schema, targets)
    }

    /// Save the submission into the session's template and compute the final
    /// field set: organic changes plus forced fields, forced values winning.
    ///
    /// The template keeps the submitted values, so call this once per session.
    pub fn prepare(
        &self,
        session: &mut BulkEditSession,
        submission: &Submission,
    ) -> Result<FieldSet, EngineError> {
        let schema = session.schema().clone();
        submission.save_into(&schema, session.template_mut())?;

        let changes = extract_changes(&schema, session.template());
        let forced = resolve_forced(&schema, submission, &self.config.force_apply_rule())?;
        Ok(merge(changes, forced))
    }

    /// Prepare the field set and apply it to the submission's `records`.
    pub fn submit(
        &mut self,
        mut session: BulkEditSession,
        submission: &Submission,
        mode: ApplyMode,
    ) -> Result<BulkEditResult, EngineError> {
        let fields = self.prepare(&mut session, submission)?;
        let targets = submission.records();
        let report = apply(&mut self.store, session.schema(), &fields, targets, mode)?;

        info!(
            session = %session.id(),
            model = session.schema().name(),
            mode = mode.as_str(),
            targets = targets.len(),
            fields = fields.len(),
            writes = report.writes,
            "bulk edit applied"
        );

        Ok(BulkEditResult {
            writes_count: report.writes,
            display_message: display_message(&session, report.writes),
            fields,
            report,
        })
    }

    pub fn submit_default(
        &mut self,
        session: BulkEditSession,
        submission: &Submission,
    ) -> Result<BulkEditResult, EngineError> {
        let mode = self.config.default_mode;
        self.submit(session, submission, mode)
    }
}

fn display_message(session: &BulkEditSession, writes: u64) -> String {
    let mut message = format!(
        "Done. Updated {writes} {}.",
        session.schema().display_name(writes)
    );
    if let Some(link) = session.back_link() {
        message.push_str(&format!(" Go back: /{}", link.trim_start_matches('/')));
    }
    message
}
