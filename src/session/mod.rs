//! Per-session form state and navigation
//!
//! A `FormSession` owns everything that changes while one user fills one
//! form: the flat value map, the per-field error map, and the pointer into
//! the visible step sequence. The config itself is shared immutably.
//!
//! Every value change runs one full recomputation (prefill, normalize,
//! resolve, pointer reconciliation) before the next event is accepted, so
//! the session is always internally consistent. Navigation transitions are
//! recorded in a command history with timestamps, mirroring how the rest of
//! the platform keeps session audit trails.
//!
//! Sessions are transient: created per user, mutated in memory, discarded
//! at the end. Nothing here persists.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::condition::ValueMap;
use crate::config::{FormConfig, Step};
use crate::expand::{normalize, NormalizedForm};
use crate::schema::{build_form_schema, build_step_schema, ValidationFailure};
use crate::transform;
use crate::visibility::{resolve, VisibleForm};

// ---------------------------------------------------------------------------
// Navigation outcomes
// ---------------------------------------------------------------------------

/// Result of a navigation transition. Validation failure is a normal
/// outcome, not an error: the pointer stays put and the field errors are
/// populated for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum NavOutcome {
    /// Pointer moved to this visible position.
    Moved { position: usize },

    /// Active step failed validation; pointer unchanged, errors populated.
    Blocked { failure: ValidationFailure },

    /// `next()` on the last visible step with a valid step: the form is
    /// ready for final submission.
    ReadyToSubmit,

    /// `previous()` at the first visible step.
    AtStart,

    /// `go_to` target beyond the visible sequence.
    OutOfRange { requested: usize },
}

/// One recorded transition, for session audit and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct NavRecord {
    pub action: String,
    pub executed_at: DateTime<Utc>,
    pub outcome: String,
}

/// Completion summary over the visible sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub position: usize,
    pub total_visible: usize,
    pub percent: u8,
}

// ---------------------------------------------------------------------------
// FormSession
// ---------------------------------------------------------------------------

/// Live state for one user filling one form.
#[derive(Debug)]
pub struct FormSession {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,

    config: Arc<FormConfig>,
    values: ValueMap,
    errors: HashMap<String, Vec<String>>,

    /// Pointer into the visible step sequence.
    position: usize,

    normalized: NormalizedForm,
    visible: VisibleForm,

    history: Vec<NavRecord>,
}

impl FormSession {
    /// Start a fresh session against a loaded config.
    pub fn new(config: Arc<FormConfig>) -> Self {
        let mut session = Self {
            session_id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            values: ValueMap::new(),
            errors: HashMap::new(),
            position: 0,
            normalized: NormalizedForm { steps: Vec::new() },
            visible: VisibleForm::default(),
            history: Vec::new(),
        };
        session.recompute();
        session
    }

    /// Start a session hydrated from an external payload via the config's
    /// inbound transformation map.
    pub fn with_inbound_payload(config: Arc<FormConfig>, payload: &Value) -> Self {
        let values = transform::inbound(payload, &config.transformations.inbound);
        let mut session = Self::new(config);
        session.values = values;
        session.recompute();
        session
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn values(&self) -> &ValueMap {
        &self.values
    }

    pub fn errors(&self) -> &HashMap<String, Vec<String>> {
        &self.errors
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current pointer into the visible sequence.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The currently active visible step, if any step is visible at all.
    pub fn active_step(&self) -> Option<&Step> {
        self.visible.steps.get(self.position)
    }

    pub fn visible_form(&self) -> &VisibleForm {
        &self.visible
    }

    pub fn history(&self) -> &[NavRecord] {
        &self.history
    }

    pub fn progress(&self) -> ProgressSummary {
        let total = self.visible.steps.len();
        let percent = if total == 0 {
            0
        } else {
            (((self.position + 1) * 100) / total).min(100) as u8
        };
        ProgressSummary {
            position: self.position,
            total_visible: total,
            percent,
        }
    }

    // -- value changes ------------------------------------------------------

    /// Apply one value change and recompute the whole projection before
    /// returning. Entered values are never discarded by recomputation.
    pub fn set_value(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        debug!(%field, "value changed");
        self.values.insert(field, value);
        self.recompute();
    }

    /// Remove a value (e.g. a cleared input) and recompute.
    pub fn clear_value(&mut self, field: &str) {
        self.values.remove(field);
        self.recompute();
    }

    // -- navigation ---------------------------------------------------------

    /// Validate the active step; advance on success. On the last visible
    /// step a successful validation reports submit readiness instead.
    pub fn next(&mut self) -> NavOutcome {
        let outcome = match self.validate_active_step() {
            Err(failure) => NavOutcome::Blocked { failure },
            Ok(()) => {
                if self.position + 1 < self.visible.steps.len() {
                    self.position += 1;
                    NavOutcome::Moved {
                        position: self.position,
                    }
                } else {
                    NavOutcome::ReadyToSubmit
                }
            }
        };
        self.record("next", &outcome);
        outcome
    }

    /// Move back one visible step. Never validates.
    pub fn previous(&mut self) -> NavOutcome {
        let outcome = if self.position > 0 {
            self.position -= 1;
            NavOutcome::Moved {
                position: self.position,
            }
        } else {
            NavOutcome::AtStart
        };
        self.record("previous", &outcome);
        outcome
    }

    /// Jump to a visible position. Backward jumps are unconditional;
    /// forward jumps require the active step to validate first.
    pub fn go_to(&mut self, target: usize) -> NavOutcome {
        let outcome = if target >= self.visible.steps.len() {
            NavOutcome::OutOfRange { requested: target }
        } else if target <= self.position {
            self.position = target;
            NavOutcome::Moved { position: target }
        } else {
            match self.validate_active_step() {
                Ok(()) => {
                    self.position = target;
                    NavOutcome::Moved { position: target }
                }
                Err(failure) => NavOutcome::Blocked { failure },
            }
        };
        self.record(&format!("go_to({target})"), &outcome);
        outcome
    }

    /// Validate every visible field of the form (per-field rules plus the
    /// config's global rules) and, on success, produce the external
    /// submission payload via the outbound map.
    pub fn submit_payload(&mut self) -> Result<Value, ValidationFailure> {
        let schema = build_form_schema(&self.visible)
            .with_global_rules(&self.config.validation.global_rules);
        match schema.validate(&self.values) {
            Ok(sanitized) => {
                for name in schema.field_names() {
                    self.errors.remove(name);
                }
                self.values.extend(sanitized);
                Ok(transform::outbound(
                    &self.values,
                    &self.config.transformations.outbound,
                ))
            }
            Err(failure) => {
                self.absorb_failure(&failure);
                Err(failure)
            }
        }
    }

    // -- internals ----------------------------------------------------------

    /// Validate the active step's visible fields, updating the error map
    /// either way. A session with no visible steps validates vacuously.
    fn validate_active_step(&mut self) -> Result<(), ValidationFailure> {
        let schema = build_step_schema(self.visible.validatable_fields(self.position));
        match schema.validate(&self.values) {
            Ok(sanitized) => {
                for name in schema.field_names() {
                    self.errors.remove(name);
                }
                // Sanitization (trimming) is merged back so the payload and
                // later re-validations see the cleaned values.
                self.values.extend(sanitized);
                Ok(())
            }
            Err(failure) => {
                self.absorb_failure(&failure);
                Err(failure)
            }
        }
    }

    fn absorb_failure(&mut self, failure: &ValidationFailure) {
        for field_errors in &failure.errors {
            self.errors
                .insert(field_errors.field.clone(), field_errors.messages.clone());
        }
    }

    /// Full projection rebuild: prefill, normalize, resolve, reconcile.
    fn recompute(&mut self) {
        let anchor = self.active_step().map(|s| s.id.clone());

        self.normalized = normalize(&self.config, &self.values);
        if self.apply_prefill() {
            // Prefill may have populated a count field.
            self.normalized = normalize(&self.config, &self.values);
        }
        self.visible = resolve(&self.normalized, &self.values);
        self.reconcile_pointer(anchor.as_deref());
    }

    /// Copy values into fields that declare a prefill source and have no
    /// value of their own yet. Returns whether anything changed.
    fn apply_prefill(&mut self) -> bool {
        let mut changed = false;
        for step in &self.normalized.steps {
            for field in &step.fields {
                let Some(source) = field.prefill_from.as_deref() else {
                    continue;
                };
                if self.values.contains_key(&field.name) {
                    continue;
                }
                if let Some(value) = self.values.get(source).cloned() {
                    debug!(field = %field.name, %source, "prefilled from source field");
                    self.values.insert(field.name.clone(), value);
                    changed = true;
                }
            }
        }
        changed
    }

    /// After any value change the pointer must reference a visible step:
    /// keep the anchor step if it survived, else the nearest later visible
    /// step in base order, else the last visible step.
    fn reconcile_pointer(&mut self, anchor: Option<&str>) {
        let Some(anchor_id) = anchor else {
            self.position = 0;
            return;
        };
        if let Some(position) = self.visible.position_of(anchor_id) {
            self.position = position;
            return;
        }
        if self.visible.is_empty() {
            self.position = 0;
            return;
        }

        let from = self.normalized.position_of(anchor_id).unwrap_or(0);
        let relocated = self.normalized.steps[from..]
            .iter()
            .find_map(|s| self.visible.position_of(&s.id))
            .unwrap_or(self.visible.steps.len() - 1);
        debug!(
            anchor = anchor_id,
            new_position = relocated,
            "active step became invisible, pointer relocated"
        );
        self.position = relocated;
    }

    fn record(&mut self, action: &str, outcome: &NavOutcome) {
        self.history.push(NavRecord {
            action: action.to_string(),
            executed_at: Utc::now(),
            outcome: match outcome {
                NavOutcome::Moved { position } => format!("moved to {position}"),
                NavOutcome::Blocked { failure } => {
                    format!("blocked on {} field(s)", failure.errors.len())
                }
                NavOutcome::ReadyToSubmit => "ready to submit".to_string(),
                NavOutcome::AtStart => "at start".to_string(),
                NavOutcome::OutOfRange { requested } => {
                    format!("out of range: {requested}")
                }
            },
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
