use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bulkedit_core::{FieldSet, ModelSchema, RecordId};
use bulkedit_storage::{RecordStore, StorageError};

use crate::error::EngineError;

/// How a final field set is written to the targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    /// Load, assign and persist each target on its own. Slower, but lifecycle
    /// hooks run and records whose values already match are not written.
    #[default]
    PerRecord,
    /// One set-based update across all targets. Lifecycle hooks do NOT run,
    /// so derived fields and cascades those hooks maintain are skipped.
    Batch,
}

impl ApplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerRecord => "per-record",
            Self::Batch => "batch",
        }
    }
}

/// Outcome of one apply run.
///
/// `updated`, `unchanged` and `missing` are only filled in per-record mode; a
/// batch update cannot tell which targets it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub mode: ApplyMode,
    pub writes: u64,
    pub updated: Vec<RecordId>,
    pub unchanged: Vec<RecordId>,
    pub missing: Vec<RecordId>,
}

impl ApplyReport {
    fn empty(mode: ApplyMode) -> Self {
        Self {
            mode,
            writes: 0,
            updated: Vec::new(),
            unchanged: Vec::new(),
            missing: Vec::new(),
        }
    }
}

/// Write `fields` to every target in `targets` using `mode`.
///
/// With no targets or no fields nothing reaches the store. In per-record mode
/// targets are processed in order and a failure stops the run with
/// [`EngineError::PartialApply`]; earlier writes are not rolled back.
pub fn apply<S: RecordStore + ?Sized>(
    store: &mut S,
    schema: &ModelSchema,
    fields: &FieldSet,
    targets: &[RecordId],
    mode: ApplyMode,
) -> Result<ApplyReport, EngineError> {
    if targets.is_empty() || fields.is_empty() {
        debug!(model = schema.name(), mode = mode.as_str(), "nothing to apply");
        return Ok(ApplyReport::empty(mode));
    }
    match mode {
        ApplyMode::PerRecord => apply_per_record(store, schema, fields, targets),
        ApplyMode::Batch => apply_batch(store, schema, fields, targets),
    }
}

fn apply_per_record<S: RecordStore + ?Sized>(
    store: &mut S,
    schema: &ModelSchema,
    fields: &FieldSet,
    targets: &[RecordId],
) -> Result<ApplyReport, EngineError> {
    let mut report = ApplyReport::empty(ApplyMode::PerRecord);

    for &id in targets {
        let loaded = match store.load_by_id(schema, id) {
            Ok(loaded) => loaded,
            Err(source) => return Err(halt(report, id, source)),
        };
        let Some(mut record) = loaded else {
            debug!(model = schema.name(), %id, "target not found, skipping");
            report.missing.push(id);
            continue;
        };

        for (field, value) in fields.iter() {
            record.set(field, value.clone());
        }
        if !record.is_changed() {
            report.unchanged.push(id);
            continue;
        }

        if let Err(source) = store.persist(schema, &mut record) {
            return Err(halt(report, id, source));
        }
        report.writes += 1;
        report.updated.push(id);
    }
    Ok(report)
}

fn halt(report: ApplyReport, failed: RecordId, source: StorageError) -> EngineError {
    warn!(
        %failed,
        written = report.updated.len(),
        error = %source,
        "per-record apply halted"
    );
    EngineError::PartialApply {
        report: Box::new(report),
        failed,
        source,
    }
}

fn apply_batch<S: RecordStore + ?Sized>(
    store: &mut S,
    schema: &ModelSchema,
    fields: &FieldSet,
    targets: &[RecordId],
) -> Result<ApplyReport, EngineError> {
    let mut report = ApplyReport::empty(ApplyMode::Batch);
    report.writes = store.execute_set_update(schema, fields, targets)?;
    Ok(report)
}
