//! Config loading and load-time validation
//!
//! Two-pass loading: hash the raw JSON bytes first, then deserialize into
//! the typed model. Hashing the original bytes (not a serde
//! re-serialization) keeps the hash stable across serde versions and map
//! ordering quirks, so it can serve as a cache identity at the boundary.
//!
//! Deserialization already rejects unknown condition operators and unknown
//! rule names; `validate_config` then lints the cross-references a type
//! system cannot see: duplicate ids, dangling array-controller references,
//! undeclared count fields, inverted template bounds.

use std::collections::HashSet;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::{ConfigError, ConfigResult};

use super::{FormConfig, RuleKind};

/// Deterministic hash of the raw config bytes.
pub fn config_hash(raw_bytes: &[u8]) -> String {
    let hash = Sha256::digest(raw_bytes);
    format!("{:x}", hash)
}

/// Load a config from raw JSON bytes. Returns `(config, hash)`.
pub fn load_config_from_bytes(raw_bytes: &[u8]) -> ConfigResult<(FormConfig, String)> {
    let hash = config_hash(raw_bytes);
    let mut config: FormConfig =
        serde_json::from_slice(raw_bytes).map_err(|e| ConfigError::Parse {
            path: "<bytes>".to_string(),
            source: e,
        })?;
    finalize(&mut config)?;
    info!(
        form_id = %config.metadata.id,
        version = %config.metadata.version,
        steps = config.steps.len(),
        %hash,
        "form config loaded"
    );
    Ok((config, hash))
}

/// Load a single config from a JSON file.
pub fn load_config_from_file(path: &Path) -> ConfigResult<(FormConfig, String)> {
    let raw_bytes = std::fs::read(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let hash = config_hash(&raw_bytes);
    let mut config: FormConfig =
        serde_json::from_slice(&raw_bytes).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
    finalize(&mut config)?;
    Ok((config, hash))
}

/// Load all configs from a directory (non-recursive, `*.json` only),
/// sorted by form id for deterministic ordering.
pub fn load_configs_from_dir(dir: &Path) -> ConfigResult<Vec<(FormConfig, String)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut configs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io {
            path: dir.display().to_string(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            configs.push(load_config_from_file(&path)?);
        }
    }
    configs.sort_by(|a, b| a.0.metadata.id.cmp(&b.0.metadata.id));
    Ok(configs)
}

/// Validate cross-references and sort steps into the canonical sequence.
fn finalize(config: &mut FormConfig) -> ConfigResult<()> {
    // Template names default to their map key.
    for (key, template) in config.array_templates.iter_mut() {
        if template.name.is_empty() {
            template.name = key.clone();
        }
    }
    validate_config(config)?;
    config.steps.sort_by_key(|s| s.order);
    Ok(())
}

/// Structural validation of a parsed config.
pub fn validate_config(config: &FormConfig) -> ConfigResult<()> {
    let mut step_ids = HashSet::new();
    let mut field_names = HashSet::new();
    let mut controllers: HashSet<&str> = HashSet::new();

    for step in &config.steps {
        if !step_ids.insert(step.id.as_str()) {
            return Err(ConfigError::DuplicateStepId {
                step_id: step.id.clone(),
            });
        }
        let mut ids_in_step = HashSet::new();
        for field in &step.fields {
            if !ids_in_step.insert(field.id.as_str()) {
                return Err(ConfigError::DuplicateFieldId {
                    step_id: step.id.clone(),
                    field_id: field.id.clone(),
                });
            }
            field_names.insert(field.name.as_str());
            if let Some(template) = field.array_controller.as_deref() {
                if !config.array_templates.contains_key(template) {
                    return Err(ConfigError::UnknownArrayTemplate {
                        field_id: field.id.clone(),
                        template: template.to_string(),
                    });
                }
                controllers.insert(template);
            }
            for rule in &field.validation {
                validate_rule_value(&field.id, rule)?;
            }
        }
    }

    for global in &config.validation.global_rules {
        validate_rule_value(&global.field, &global.rule)?;
    }

    for (name, template) in &config.array_templates {
        if template.min_count > template.max_count {
            return Err(ConfigError::InvalidTemplateBounds {
                template: name.clone(),
                min: template.min_count,
                max: template.max_count,
            });
        }
        if !controllers.contains(name.as_str()) {
            return Err(ConfigError::MissingArrayController {
                template: name.clone(),
            });
        }
        if !field_names.contains(template.count_field.as_str()) {
            return Err(ConfigError::UnknownCountField {
                template: name.clone(),
                count_field: template.count_field.clone(),
            });
        }
    }

    // Step order gaps are legal but usually a config-editing accident.
    let mut orders: Vec<u32> = config.steps.iter().map(|s| s.order).collect();
    orders.sort_unstable();
    if orders.windows(2).any(|w| w[1] > w[0] + 1) {
        warn!(
            form_id = %config.metadata.id,
            "non-contiguous step order values; sequence follows sorted order"
        );
    }

    Ok(())
}

/// Rules with thresholds must declare a usable value at load time, not fail
/// strangely mid-session.
fn validate_rule_value(field_id: &str, rule: &super::ValidationRule) -> ConfigResult<()> {
    let needs_number = matches!(
        rule.rule,
        RuleKind::MinLength
            | RuleKind::MaxLength
            | RuleKind::Min
            | RuleKind::Max
            | RuleKind::MinAge
            | RuleKind::MaxAge
            | RuleKind::MinCreditScore
    );
    if needs_number && rule.value.as_ref().and_then(|v| v.as_f64()).is_none() {
        return Err(ConfigError::InvalidRuleValue {
            field_id: field_id.to_string(),
            rule: format!("{:?}", rule.rule),
            expected: "numeric".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_config_json() -> serde_json::Value {
        json!({
            "metadata": {"id": "loan-app", "name": "Loan Application", "version": "1.0"},
            "steps": [
                {
                    "id": "loan-type",
                    "name": "Loan Type",
                    "order": 2,
                    "fields": [
                        {"id": "loanTypeName", "name": "loanTypeName", "type": "options-cards"}
                    ]
                },
                {
                    "id": "basics",
                    "name": "Basics",
                    "order": 1,
                    "fields": [
                        {"id": "borrowerCount", "name": "borrowerCount", "type": "dropdown",
                         "arrayController": "borrowers"}
                    ]
                }
            ],
            "arrayTemplates": {
                "borrowers": {
                    "minCount": 1, "maxCount": 4, "defaultCount": 1,
                    "countField": "borrowerCount",
                    "fieldTemplate": [
                        {"id": "firstName", "name": "firstName", "type": "text", "required": true}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_load_sorts_steps_by_order() {
        let bytes = serde_json::to_vec(&base_config_json()).unwrap();
        let (config, _) = load_config_from_bytes(&bytes).unwrap();
        let ids: Vec<&str> = config.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["basics", "loan-type"]);
    }

    #[test]
    fn test_template_name_defaults_to_key() {
        let bytes = serde_json::to_vec(&base_config_json()).unwrap();
        let (config, _) = load_config_from_bytes(&bytes).unwrap();
        assert_eq!(config.array_templates["borrowers"].name, "borrowers");
    }

    #[test]
    fn test_hash_is_raw_bytes() {
        let a = serde_json::to_vec(&base_config_json()).unwrap();
        let mut b = a.clone();
        b.push(b' ');
        assert_eq!(config_hash(&a).len(), 64);
        assert_ne!(config_hash(&a), config_hash(&b));
    }

    #[test]
    fn test_unknown_operator_is_config_error() {
        let mut cfg = base_config_json();
        cfg["steps"][0]["conditions"] = json!([{"matches": [{"var": "x"}, "y"]}]);
        let bytes = serde_json::to_vec(&cfg).unwrap();
        let err = load_config_from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("Unknown condition operator"));
    }

    #[test]
    fn test_duplicate_field_id_rejected() {
        let mut cfg = base_config_json();
        cfg["steps"][0]["fields"] = json!([
            {"id": "a", "name": "a", "type": "text"},
            {"id": "a", "name": "a2", "type": "text"}
        ]);
        let bytes = serde_json::to_vec(&cfg).unwrap();
        assert!(matches!(
            load_config_from_bytes(&bytes),
            Err(ConfigError::DuplicateFieldId { .. })
        ));
    }

    #[test]
    fn test_dangling_array_controller_rejected() {
        let mut cfg = base_config_json();
        cfg["steps"][1]["fields"][0]["arrayController"] = json!("guarantors");
        let bytes = serde_json::to_vec(&cfg).unwrap();
        assert!(matches!(
            load_config_from_bytes(&bytes),
            Err(ConfigError::UnknownArrayTemplate { .. })
        ));
    }

    #[test]
    fn test_template_without_controller_rejected() {
        let mut cfg = base_config_json();
        cfg["steps"][1]["fields"][0]
            .as_object_mut()
            .unwrap()
            .remove("arrayController");
        let bytes = serde_json::to_vec(&cfg).unwrap();
        assert!(matches!(
            load_config_from_bytes(&bytes),
            Err(ConfigError::MissingArrayController { .. })
        ));
    }

    #[test]
    fn test_undeclared_count_field_rejected() {
        let mut cfg = base_config_json();
        cfg["arrayTemplates"]["borrowers"]["countField"] = json!("noSuchField");
        let bytes = serde_json::to_vec(&cfg).unwrap();
        assert!(matches!(
            load_config_from_bytes(&bytes),
            Err(ConfigError::UnknownCountField { .. })
        ));
    }

    #[test]
    fn test_rule_missing_threshold_rejected() {
        let mut cfg = base_config_json();
        cfg["steps"][0]["fields"][0]["validation"] = json!([{"rule": "min"}]);
        let bytes = serde_json::to_vec(&cfg).unwrap();
        assert!(matches!(
            load_config_from_bytes(&bytes),
            Err(ConfigError::InvalidRuleValue { .. })
        ));
    }

    #[test]
    fn test_load_from_dir_sorted_by_id() {
        let dir = tempfile::tempdir().unwrap();
        for (file, id) in [("z.json", "b-form"), ("a.json", "a-form")] {
            let mut cfg = base_config_json();
            cfg["metadata"]["id"] = json!(id);
            std::fs::write(
                dir.path().join(file),
                serde_json::to_vec(&cfg).unwrap(),
            )
            .unwrap();
        }
        // A non-JSON file is ignored.
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();

        let configs = load_configs_from_dir(dir.path()).unwrap();
        let ids: Vec<&str> = configs.iter().map(|(c, _)| c.metadata.id.as_str()).collect();
        assert_eq!(ids, vec!["a-form", "b-form"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config_from_file(Path::new("/nonexistent/form.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
