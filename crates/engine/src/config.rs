use std::path::Path;

use serde::{Deserialize, Serialize};

use bulkedit_core::reconcile::{BaseNameRule, CHECKBOX_SUFFIX, ForceApplyRule};

use crate::apply::ApplyMode;
use crate::error::EngineError;

/// Bulk-edit settings, read from TOML.
///
/// ```toml
/// checkbox_suffix = "_UnchangedCheckbox"
/// base_name_rule = "first-segment"
/// default_mode = "per-record"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BulkEditConfig {
    pub checkbox_suffix: String,
    pub base_name_rule: BaseNameRule,
    pub default_mode: ApplyMode,
}

impl Default for BulkEditConfig {
    fn default() -> Self {
        Self {
            checkbox_suffix: CHECKBOX_SUFFIX.to_string(),
            base_name_rule: BaseNameRule::FirstSegment,
            default_mode: ApplyMode::PerRecord,
        }
    }
}

impl BulkEditConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.checkbox_suffix.is_empty() {
            return Err(EngineError::Config("checkbox_suffix must not be empty".into()));
        }
        if self.base_name_rule == BaseNameRule::FirstSegment
            && !self.checkbox_suffix.starts_with('_')
        {
            // The base name would swallow the suffix up to its first underscore.
            return Err(EngineError::Config(
                "checkbox_suffix must start with '_' under the first-segment rule".into(),
            ));
        }
        Ok(())
    }

    pub fn force_apply_rule(&self) -> ForceApplyRule {
        ForceApplyRule {
            suffix: self.checkbox_suffix.clone(),
            base_name: self.base_name_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = BulkEditConfig::from_toml_str("").unwrap();
        assert_eq!(config, BulkEditConfig::default());
        assert_eq!(config.force_apply_rule(), ForceApplyRule::default());
    }

    #[test]
    fn reads_all_keys() {
        let config = BulkEditConfig::from_toml_str(
            r#"
            checkbox_suffix = "__force"
            base_name_rule = "strip-suffix"
            default_mode = "batch"
            "#,
        )
        .unwrap();
        assert_eq!(config.checkbox_suffix, "__force");
        assert_eq!(config.base_name_rule, BaseNameRule::StripSuffix);
        assert_eq!(config.default_mode, ApplyMode::Batch);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(BulkEditConfig::from_toml_str("mode = \"batch\"").is_err());
        assert!(BulkEditConfig::from_toml_str("default_mode = \"fast\"").is_err());
        assert!(BulkEditConfig::from_toml_str("checkbox_suffix = \"\"").is_err());
        assert!(BulkEditConfig::from_toml_str("checkbox_suffix = \"Force\"").is_err());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = BulkEditConfig::load(Path::new("/nonexistent/bulkedit.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }
}
