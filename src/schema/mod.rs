//! Validation schema generation
//!
//! Builds a validator set restricted to the currently visible,
//! validity-relevant fields, so conditionally-hidden fields can never block
//! submission and conditionally-shown fields are validated exactly while
//! shown. Rebuilt whenever the visible field set changes; building is
//! cheap, the rules live on the fields themselves.
//!
//! Validation output is either the sanitized values (strings trimmed,
//! restricted to schema fields) or per-field violation messages in rule
//! declaration order.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::condition::ValueMap;
use crate::config::{Field, GlobalRule, RuleKind, ValidationRule};
use crate::visibility::VisibleForm;

mod bands;

pub use bands::{band_score, CREDIT_SCORE_BANDS};

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// Validators for one step's (or one whole form's) visible fields.
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    validators: Vec<FieldValidator>,
}

#[derive(Debug, Clone)]
struct FieldValidator {
    field: String,
    required: bool,
    rules: Vec<ValidationRule>,
}

/// Validation failure: per-field messages, fields in visible order,
/// messages in rule declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationFailure {
    pub errors: Vec<FieldErrors>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldErrors {
    pub field: String,
    pub messages: Vec<String>,
}

/// Build a schema over one step's visible validity-relevant fields.
pub fn build_step_schema(fields: &[Field]) -> StepSchema {
    StepSchema {
        validators: fields
            .iter()
            .map(|f| FieldValidator {
                field: f.name.clone(),
                required: f.is_required(),
                rules: f.validation.clone(),
            })
            .collect(),
    }
}

/// Build a schema over every visible validity-relevant field of the form,
/// in step order. Used for final submission.
pub fn build_form_schema(visible: &VisibleForm) -> StepSchema {
    let fields: Vec<Field> = visible
        .all_validatable_fields()
        .into_iter()
        .cloned()
        .collect();
    build_step_schema(&fields)
}

impl StepSchema {
    /// Append form-wide rules to the validators of the fields they name.
    /// Rules naming fields outside this schema (hidden or unknown) are
    /// dropped, keeping the visibility restriction intact.
    pub fn with_global_rules(mut self, rules: &[GlobalRule]) -> Self {
        for global in rules {
            if let Some(validator) = self
                .validators
                .iter_mut()
                .find(|v| v.field == global.field)
            {
                if global.rule.rule == RuleKind::Required {
                    validator.required = true;
                }
                validator.rules.push(global.rule.clone());
            }
        }
        self
    }

    /// Field names covered by this schema, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(|v| v.field.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.validators.iter().any(|v| v.field == field)
    }

    /// Validate the current values against this schema.
    ///
    /// Success returns the sanitized values restricted to schema fields.
    /// Failure lists every violated rule message; it never short-circuits
    /// at the first bad field, the UI wants all of them at once.
    pub fn validate(&self, values: &ValueMap) -> Result<ValueMap, ValidationFailure> {
        let mut sanitized = ValueMap::new();
        let mut failure = ValidationFailure::default();

        for validator in &self.validators {
            let value = values.get(&validator.field);
            let messages = validator.check(value);
            if messages.is_empty() {
                if let Some(v) = value {
                    if !is_empty_value(v) {
                        sanitized.insert(validator.field.clone(), sanitize(v));
                    }
                }
            } else {
                failure.errors.push(FieldErrors {
                    field: validator.field.clone(),
                    messages,
                });
            }
        }

        if failure.errors.is_empty() {
            Ok(sanitized)
        } else {
            Err(failure)
        }
    }
}

impl FieldValidator {
    fn check(&self, value: Option<&Value>) -> Vec<String> {
        let empty = value.map(is_empty_value).unwrap_or(true);

        // Optional and empty: passes trivially, no other rule applies.
        if empty && !self.required {
            return Vec::new();
        }

        let mut messages = Vec::new();
        if empty {
            let declared = self
                .rules
                .iter()
                .find(|r| r.rule == RuleKind::Required)
                .and_then(|r| r.message.clone());
            messages.push(declared.unwrap_or_else(|| default_message(RuleKind::Required)));
            return messages;
        }
        let value = value.expect("non-empty implies present");

        for rule in &self.rules {
            if rule.rule == RuleKind::Required {
                continue; // handled above
            }
            if !check_rule(rule, value) {
                messages.push(
                    rule.message
                        .clone()
                        .unwrap_or_else(|| default_message(rule.rule)),
                );
            }
        }
        messages
    }
}

// ---------------------------------------------------------------------------
// Rule checks
// ---------------------------------------------------------------------------

fn check_rule(rule: &ValidationRule, value: &Value) -> bool {
    let threshold = || rule.value.as_ref().and_then(Value::as_f64);
    match rule.rule {
        RuleKind::Required => true,
        RuleKind::MinLength => match (value.as_str(), threshold()) {
            (Some(s), Some(n)) => s.trim().chars().count() as f64 >= n,
            _ => false,
        },
        RuleKind::MaxLength => match (value.as_str(), threshold()) {
            (Some(s), Some(n)) => s.trim().chars().count() as f64 <= n,
            _ => false,
        },
        RuleKind::Min => match (numeric(value), threshold()) {
            (Some(v), Some(n)) => v >= n,
            _ => false,
        },
        RuleKind::Max => match (numeric(value), threshold()) {
            (Some(v), Some(n)) => v <= n,
            _ => false,
        },
        RuleKind::Email => matches_pattern(value, email_regex()),
        RuleKind::PhoneUs => matches_pattern(value, phone_us_regex()),
        RuleKind::ZipCode => matches_pattern(value, zip_regex()),
        RuleKind::SsnFormat => matches_pattern(value, ssn_regex()),
        RuleKind::MinAge => match (age_in_years(value), threshold()) {
            (Some(age), Some(n)) => age as f64 >= n,
            _ => false,
        },
        RuleKind::MaxAge => match (age_in_years(value), threshold()) {
            (Some(age), Some(n)) => age as f64 <= n,
            _ => false,
        },
        RuleKind::MinCreditScore => match (value.as_str(), threshold()) {
            (Some(band), Some(n)) => band_score(band) as f64 >= n,
            _ => false,
        },
    }
}

/// Empty for the purposes of `required`: absent, null, blank string,
/// unchecked checkbox, empty array.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Bool(b) => !b,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Numbers, or numeric strings as text inputs deliver them.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn matches_pattern(value: &Value, pattern: &Regex) -> bool {
    value
        .as_str()
        .map(|s| pattern.is_match(s.trim()))
        .unwrap_or(false)
}

/// Whole years from a date-of-birth-like value to today.
fn age_in_years(value: &Value) -> Option<i32> {
    let raw = value.as_str()?.trim();
    let dob = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()?;
    let today = Utc::now().date_naive();
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    Some(age)
}

fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

fn default_message(kind: RuleKind) -> String {
    match kind {
        RuleKind::Required => "This field is required".to_string(),
        RuleKind::MinLength => "Value is too short".to_string(),
        RuleKind::MaxLength => "Value is too long".to_string(),
        RuleKind::Min => "Value is below the minimum".to_string(),
        RuleKind::Max => "Value is above the maximum".to_string(),
        RuleKind::Email => "Enter a valid email address".to_string(),
        RuleKind::PhoneUs => "Enter a valid US phone number".to_string(),
        RuleKind::ZipCode => "Enter a valid ZIP code".to_string(),
        RuleKind::SsnFormat => "Enter SSN as XXX-XX-XXXX".to_string(),
        RuleKind::MinAge => "Below the minimum age".to_string(),
        RuleKind::MaxAge => "Above the maximum age".to_string(),
        RuleKind::MinCreditScore => "Credit score is below the minimum".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid pattern")
    })
}

fn phone_us_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\+?1[-. ]?)?(\(\d{3}\)[-. ]?|\d{3}[-. ]?)\d{3}[-. ]?\d{4}$")
            .expect("valid pattern")
    })
}

fn zip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid pattern"))
}

fn ssn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{3}-\d{2}-\d{4}$").expect("valid pattern"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
