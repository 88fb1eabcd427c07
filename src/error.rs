//! Error handling for the form-flow engine
//!
//! Only configuration problems are fatal to a session. Everything else
//! (failed field validation, unresolvable transformation paths,
//! out-of-bounds array counts) is recovered locally and surfaced as
//! structured data.

use thiserror::Error;

/// Top-level error type for the engine.
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation failed for {} field(s)", .0.errors.len())]
    Validation(crate::schema::ValidationFailure),
}

/// Fatal configuration errors.
///
/// A session cannot proceed past any of these. Unknown condition operators
/// and unknown validation rule names surface here as `Parse` errors because
/// the typed config model rejects them during deserialization.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Form config '{form_id}' not found")]
    NotFound { form_id: String },

    #[error("IO error loading config '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Parse error in config '{path}': {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Duplicate step id '{step_id}'")]
    DuplicateStepId { step_id: String },

    #[error("Duplicate field id '{field_id}' in step '{step_id}'")]
    DuplicateFieldId { step_id: String, field_id: String },

    #[error("Field '{field_id}' references unknown array template '{template}'")]
    UnknownArrayTemplate { field_id: String, template: String },

    #[error("Array template '{template}' is not referenced by any controlling field")]
    MissingArrayController { template: String },

    #[error("Array template '{template}' count field '{count_field}' is not declared by any field")]
    UnknownCountField {
        template: String,
        count_field: String,
    },

    #[error("Array template '{template}' declares minCount {min} > maxCount {max}")]
    InvalidTemplateBounds { template: String, min: u32, max: u32 },

    #[error("Rule '{rule}' on field '{field_id}' requires a {expected} value")]
    InvalidRuleValue {
        field_id: String,
        rule: String,
        expected: String,
    },
}

/// Result alias for config loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;
