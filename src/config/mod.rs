//! Form configuration model
//!
//! A `FormConfig` is the immutable, declarative description of one
//! application form: ordered steps of typed fields, visibility conditions,
//! repeatable array templates, and the transformation maps that tie the flat
//! internal field space to the external nested payload shape.
//!
//! Configs are loaded once, validated, and shared by reference (`Arc`) into
//! every session; there is no process-wide registry or mutable cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::transform::TransformMap;

mod loader;

pub use loader::{
    config_hash, load_config_from_bytes, load_config_from_file, load_configs_from_dir,
    validate_config,
};

// ---------------------------------------------------------------------------
// FormConfig (top-level)
// ---------------------------------------------------------------------------

/// A complete form definition, immutable per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormConfig {
    pub metadata: FormMetadata,

    /// Ordered steps. The loader sorts these by `order`; the sorted sequence
    /// is the canonical base sequence every visible subsequence preserves.
    pub steps: Vec<Step>,

    /// Repeatable field-group blueprints, keyed by template name.
    #[serde(default)]
    pub array_templates: BTreeMap<String, ArrayTemplate>,

    #[serde(default)]
    pub flow_config: FlowConfig,

    /// Form-wide rules applied on final submission in addition to the
    /// per-field rules.
    #[serde(default)]
    pub validation: GlobalValidation,

    /// Internal field id ↔ external payload path maps.
    #[serde(default)]
    pub transformations: Transformations,
}

/// Identity block for a form config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

/// Flow-style tag for the rendering layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(rename = "type", default)]
    pub flow_type: FlowType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Linear,
    #[default]
    Wizard,
    Selection,
    Single,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalValidation {
    #[serde(default)]
    pub global_rules: Vec<GlobalRule>,
}

/// A form-wide rule targeting a named field, applied on final submission
/// in addition to the field's own rules. Rules naming fields that are not
/// currently visible are skipped, same as per-field rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalRule {
    pub field: String,
    #[serde(flatten)]
    pub rule: ValidationRule,
}

/// Inbound and outbound path maps. Both pair an internal field name with a
/// dotted/bracket-indexed path into the external payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transformations {
    #[serde(default)]
    pub inbound: TransformMap,
    #[serde(default)]
    pub outbound: TransformMap,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A named group of fields shown together, gated by its own conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,

    /// Position in the canonical base sequence.
    pub order: u32,

    #[serde(default)]
    pub required: bool,

    /// Visible iff every condition holds (conjunctive).
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default)]
    pub fields: Vec<Field>,
}

// ---------------------------------------------------------------------------
// Field
// ---------------------------------------------------------------------------

/// The smallest input unit: type, validation rules, visibility conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub required: bool,

    /// Rules applied in declaration order while the field is visible.
    #[serde(default)]
    pub validation: Vec<ValidationRule>,

    /// Layout hint (column span) for the rendering layer.
    #[serde(default)]
    pub grid: Option<u8>,

    #[serde(default)]
    pub options: Vec<FieldOption>,

    /// Visible iff every condition holds, evaluated only while the
    /// containing step is visible.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Names the array template whose instance count this field drives.
    #[serde(default)]
    pub array_controller: Option<String>,

    /// Set on materialized template instances: which instance this field
    /// belongs to.
    #[serde(default)]
    pub array_index: Option<u32>,

    /// Copy this field's initial value from another field.
    #[serde(default)]
    pub prefill_from: Option<String>,
}

impl Field {
    /// Whether the field participates in validation while visible.
    /// Labels and hidden fields are display/plumbing only.
    pub fn is_validatable(&self) -> bool {
        !matches!(self.field_type, FieldType::Label | FieldType::Hidden)
    }

    /// Whether the field carries an explicit or rule-declared required
    /// constraint.
    pub fn is_required(&self) -> bool {
        self.required
            || self
                .validation
                .iter()
                .any(|r| r.rule == RuleKind::Required)
    }
}

/// Semantic field types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    Text,
    Email,
    Phone,
    Password,
    Dropdown,
    Options,
    OptionsCards,
    Radio,
    Checkbox,
    Date,
    Currency,
    Label,
    Hidden,
}

/// A selectable option for dropdown/options/radio fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Validation rules
// ---------------------------------------------------------------------------

/// A single declared rule: kind, optional threshold, optional message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub rule: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Closed set of rule names. Unknown names fail config deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    Required,
    MinLength,
    MaxLength,
    Min,
    Max,
    Email,
    #[serde(rename = "phoneUS")]
    PhoneUs,
    ZipCode,
    SsnFormat,
    MinAge,
    MaxAge,
    MinCreditScore,
}

// ---------------------------------------------------------------------------
// Array templates
// ---------------------------------------------------------------------------

/// Blueprint for a repeatable field group whose instance count is driven by
/// another field's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayTemplate {
    /// Display name; defaults to the map key when omitted in JSON.
    #[serde(default)]
    pub name: String,

    pub min_count: u32,
    pub max_count: u32,
    pub default_count: u32,

    /// Name of the field whose current value drives the instance count.
    pub count_field: String,

    /// Ordered field blueprints, materialized once per instance.
    #[serde(default)]
    pub field_template: Vec<Field>,
}
