use bulkedit_core::{FieldType, FieldValue, ModelSchema, RecordId, Submission};
use bulkedit_engine::{ApplyMode, BulkEditConfig, BulkEditor, EngineError};
use bulkedit_harness::TestSite;
use bulkedit_storage::SqliteStore;

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.into())
}

/// Seed twelve articles and drop #11, leaving targets 10, 11 (missing), 12.
fn site_with_gap() -> Result<(TestSite, Vec<RecordId>), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let ids = site.seed(12)?;
    let targets = vec![ids[9], ids[10], ids[11]];
    site.remove(ids[10])?;
    site.reset_observers();
    Ok((site, targets))
}

/// What a browser posts for the status/title edit: every form field, empty
/// ones included, one ticked checkbox and the target list.
fn status_title_submission(targets: &[RecordId]) -> Result<Submission, Box<dyn std::error::Error>> {
    let mut pairs = vec![
        ("Title".to_string(), "Reviewed".to_string()),
        ("Status".to_string(), "Published".to_string()),
        ("Publish_Date".to_string(), String::new()),
        ("Views".to_string(), String::new()),
        ("Slug".to_string(), String::new()),
        ("Title_UnchangedCheckbox".to_string(), "1".to_string()),
    ];
    pairs.extend(targets.iter().map(|id| ("records[]".to_string(), id.to_string())));
    Ok(Submission::from_pairs(pairs)?)
}

// ============================================================================
// Field-set reconciliation
// ============================================================================

#[test]
fn final_field_set_merges_changes_and_forced_fields() -> Result<(), Box<dyn std::error::Error>> {
    let (site, targets) = site_with_gap()?;
    let mut session = site.editor.begin(&site.schema, targets.clone());

    let fields = site
        .editor
        .prepare(&mut session, &status_title_submission(&targets)?)?;

    assert_eq!(fields.len(), 2);
    assert_eq!(fields.get("Status"), Some(&text("Published")));
    assert_eq!(fields.get("Title"), Some(&text("Reviewed")));
    assert_eq!(site.calls.total(), 0);
    Ok(())
}

#[test]
fn forced_field_is_applied_even_when_unchanged() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let ids = site.seed(2)?;
    site.update_article(ids[0], vec![("Status", text("Published"))])?;
    site.reset_observers();

    // "Draft" is the template default, so it is not an organic change.
    let submission = Submission::new()
        .with("Status", "Draft")
        .with("Status_UnchangedCheckbox", "1")
        .with_records(ids.iter().map(RecordId::get));
    let session = site.editor.begin(&site.schema, ids.clone());
    let result = site.editor.submit(session, &submission, ApplyMode::PerRecord)?;

    assert_eq!(result.fields.get("Status"), Some(&text("Draft")));
    assert_eq!(result.writes_count, 1);
    assert_eq!(result.report.updated, vec![ids[0]]);
    assert_eq!(result.report.unchanged, vec![ids[1]]);
    assert_eq!(site.field(ids[0], "Status")?, Some(text("Draft")));
    Ok(())
}

#[test]
fn virtual_and_unknown_fields_never_reach_field_set() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    let submission = Submission::new()
        .with("Summary", "computed text")
        .with("Summary_UnchangedCheckbox", "1")
        .with("Ghost_UnchangedCheckbox", "1")
        .with("Ghost", "boo");
    let mut session = site.editor.begin(&site.schema, Vec::new());

    let fields = site.editor.prepare(&mut session, &submission)?;
    assert!(fields.is_empty());
    assert_eq!(session.template().get("Summary"), Some(&text("computed text")));
    Ok(())
}

#[test]
fn first_segment_rule_forces_the_wrong_field() -> Result<(), Box<dyn std::error::Error>> {
    let site = TestSite::new()?;
    // Operator wants Publish_Date cleared everywhere; the empty value equals
    // the template default, so only the checkbox can carry it.
    let submission = Submission::new()
        .with("Publish_Date", "")
        .with("Publish_Date_UnchangedCheckbox", "1");
    let mut session = site.editor.begin(&site.schema, Vec::new());

    let fields = site.editor.prepare(&mut session, &submission)?;
    assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["Publish"]);
    assert_eq!(fields.get("Publish"), Some(&FieldValue::Null));
    Ok(())
}

#[test]
fn first_segment_rule_drops_unmatched_flag() -> Result<(), Box<dyn std::error::Error>> {
    let schema = ModelSchema::builder("Event")
        .field("Publish_Date", FieldType::Date)
        .build()?;
    let mut store = SqliteStore::open_in_memory()?;
    store.install_model(&schema)?;
    let editor = BulkEditor::new(store);

    let submission = Submission::new()
        .with("Publish_Date", "")
        .with("Publish_Date_UnchangedCheckbox", "1");
    let mut session = editor.begin(&schema, Vec::new());
    assert!(editor.prepare(&mut session, &submission)?.is_empty());
    Ok(())
}

#[test]
fn strip_suffix_rule_forces_the_full_field_name() -> Result<(), Box<dyn std::error::Error>> {
    let config = BulkEditConfig::from_toml_str(r#"base_name_rule = "strip-suffix""#)?;
    let mut site = TestSite::with_config(config)?;
    let id = site.create_article(vec![(
        "Publish_Date",
        FieldType::Date.parse_raw("Publish_Date", "2024-05-01")?,
    )])?;
    site.reset_observers();

    let submission = Submission::new()
        .with("Publish_Date", "")
        .with("Publish_Date_UnchangedCheckbox", "1")
        .with_records([id.get()]);
    let session = site.editor.begin(&site.schema, vec![id]);
    let result = site.editor.submit(session, &submission, ApplyMode::PerRecord)?;

    assert_eq!(result.fields.keys().collect::<Vec<_>>(), vec!["Publish_Date"]);
    assert_eq!(result.writes_count, 1);
    assert_eq!(site.field(id, "Publish_Date")?, Some(FieldValue::Null));
    Ok(())
}

#[test]
fn uncoercible_value_fails_before_any_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let ids = site.seed(2)?;
    site.reset_observers();

    let submission = Submission::new()
        .with("Views", "lots")
        .with_records(ids.iter().map(RecordId::get));
    let session = site.editor.begin(&site.schema, ids);
    let err = site
        .editor
        .submit(session, &submission, ApplyMode::Batch)
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(err, EngineError::Core(_)));
    assert_eq!(site.calls.total(), 0);
    Ok(())
}

// ============================================================================
// End-to-end submissions
// ============================================================================

#[test]
fn per_record_skips_missing_target() -> Result<(), Box<dyn std::error::Error>> {
    let (mut site, targets) = site_with_gap()?;
    let submission = status_title_submission(&targets)?;
    let session = site.editor.begin(&site.schema, targets.clone());

    let result = site.editor.submit(session, &submission, ApplyMode::PerRecord)?;

    assert_eq!(result.writes_count, 2);
    assert_eq!(result.report.updated, vec![targets[0], targets[2]]);
    assert_eq!(result.report.missing, vec![targets[1]]);
    assert_eq!(result.display_message, "Done. Updated 2 Articles.");
    assert_eq!(site.writes.written(), vec![targets[0], targets[2]]);

    for id in [targets[0], targets[2]] {
        assert_eq!(site.field(id, "Status")?, Some(text("Published")));
        assert_eq!(site.field(id, "Title")?, Some(text("Reviewed")));
        // Lifecycle hook recomputed the derived slug.
        assert_eq!(site.field(id, "Slug")?, Some(text("reviewed")));
    }
    assert!(site.load(targets[1])?.is_none());
    Ok(())
}

#[test]
fn batch_counts_only_rows_that_change() -> Result<(), Box<dyn std::error::Error>> {
    let (mut site, targets) = site_with_gap()?;
    site.update_article(
        targets[0],
        vec![("Status", text("Published")), ("Title", text("Reviewed"))],
    )?;
    site.reset_observers();

    let submission = status_title_submission(&targets)?;
    let session = site.editor.begin(&site.schema, targets.clone());
    let result = site.editor.submit(session, &submission, ApplyMode::Batch)?;

    assert_eq!(result.writes_count, 1);
    assert_eq!(result.display_message, "Done. Updated 1 Article.");
    assert_eq!(site.calls.set_updates(), 1);
    assert_eq!(site.calls.loads(), 0);
    assert_eq!(site.calls.persists(), 0);

    assert_eq!(site.field(targets[2], "Title")?, Some(text("Reviewed")));
    // No hooks in batch mode: the slug still reflects the old title.
    assert_eq!(site.field(targets[2], "Slug")?, Some(text("article-12")));
    assert!(site.writes.written().is_empty());
    Ok(())
}

#[test]
fn empty_target_list_issues_no_store_calls() -> Result<(), Box<dyn std::error::Error>> {
    let (mut site, _) = site_with_gap()?;
    for mode in [ApplyMode::PerRecord, ApplyMode::Batch] {
        let submission = status_title_submission(&[])?;
        let session = site.editor.begin(&site.schema, Vec::new());
        let result = site.editor.submit(session, &submission, mode)?;

        assert_eq!(result.writes_count, 0);
        assert_eq!(result.display_message, "Done. Updated 0 Articles.");
    }
    assert_eq!(site.calls.total(), 0);
    Ok(())
}

#[test]
fn missing_records_key_is_zero_writes() -> Result<(), Box<dyn std::error::Error>> {
    let (mut site, targets) = site_with_gap()?;
    let submission = Submission::from_json(r#"{"Status": "Published"}"#)?;
    let session = site.editor.begin(&site.schema, targets);

    let result = site.editor.submit(session, &submission, ApplyMode::PerRecord)?;
    assert_eq!(result.writes_count, 0);
    assert_eq!(site.calls.total(), 0);
    Ok(())
}

#[test]
fn json_submission_with_default_mode_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = BulkEditConfig::from_toml_str(r#"default_mode = "batch""#)?;
    let mut site = TestSite::with_config(config)?;
    let ids = site.seed(3)?;
    site.reset_observers();

    let json = format!(
        r#"{{"Views": 42, "Views_UnchangedCheckbox": "1", "records": [{}, {}, "{}"]}}"#,
        ids[0], ids[1], ids[2]
    );
    let submission = Submission::from_json(&json)?;
    let session = site.editor.begin(&site.schema, ids.clone());
    let result = site.editor.submit_default(session, &submission)?;

    assert_eq!(result.report.mode, ApplyMode::Batch);
    assert_eq!(result.writes_count, 3);
    for id in ids {
        assert_eq!(site.field(id, "Views")?, Some(FieldValue::Integer(42)));
    }
    Ok(())
}

#[test]
fn result_serializes_for_the_controller() -> Result<(), Box<dyn std::error::Error>> {
    let mut site = TestSite::new()?;
    let ids = site.seed(1)?;
    let submission = Submission::new()
        .with("Status", "Archived")
        .with_records([ids[0].get()]);
    let session = site
        .editor
        .begin(&site.schema, ids.clone())
        .with_back_link("admin/articles?q=old");

    let result = site.editor.submit(session, &submission, ApplyMode::PerRecord)?;
    assert_eq!(
        result.display_message,
        "Done. Updated 1 Article. Go back: /admin/articles"
    );

    let json = serde_json::to_value(&result)?;
    assert_eq!(json["writes_count"], 1);
    assert_eq!(json["report"]["mode"], "per-record");
    assert_eq!(json["report"]["updated"][0], ids[0].get());
    assert_eq!(json["fields"]["Status"]["Text"], "Archived");
    Ok(())
}
