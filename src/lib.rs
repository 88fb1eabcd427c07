//! form-flow - conditional form navigation and validation engine
//!
//! Renders-agnostic core for long, branching multi-step application forms
//! driven by a declarative JSON config: condition-gated step/field
//! visibility, repeatable field groups sized by a count field, validation
//! schemas restricted to what is currently visible, and bidirectional
//! mapping between the flat internal field space and an external nested
//! payload.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use form_flow::{load_config_from_file, FormSession, NavOutcome};
//!
//! let (config, _hash) = load_config_from_file("config/loan-application.json".as_ref())?;
//! let mut session = FormSession::new(Arc::new(config));
//!
//! session.set_value("loanTypeName", "debt-service-coverage-ratio".into());
//! match session.next() {
//!     NavOutcome::Moved { position } => println!("now at step {position}"),
//!     NavOutcome::Blocked { failure } => println!("{} fields invalid", failure.errors.len()),
//!     other => println!("{other:?}"),
//! }
//! # Ok::<(), form_flow::ConfigError>(())
//! ```

// Core error handling
pub mod error;

// Condition expression language and evaluation
pub mod condition;

// Declarative form configuration model and loader
pub mod config;

// Array-template expansion (config normalization)
pub mod expand;

// Visible step/field resolution
pub mod visibility;

// Validation schema generation
pub mod schema;

// External payload ↔ flat value mapping
pub mod transform;

// Per-session state and navigation
pub mod session;

// Async boundary collaborators
pub mod service;

// Public re-exports
pub use condition::{evaluate, Condition, ConditionParseError, Operand, ValueMap};
pub use config::{
    config_hash, load_config_from_bytes, load_config_from_file, load_configs_from_dir,
    validate_config, ArrayTemplate, Field, FieldOption, FieldType, FlowType, FormConfig,
    FormMetadata, GlobalRule, RuleKind, Step, ValidationRule,
};
pub use error::{ConfigError, ConfigResult, FormError};
pub use expand::{instance_count, instance_field_name, normalize, NormalizedForm};
pub use schema::{
    band_score, build_form_schema, build_step_schema, FieldErrors, StepSchema, ValidationFailure,
    CREDIT_SCORE_BANDS,
};
pub use service::{
    ConfigStore, DispatchResult, FormService, InMemoryConfigStore, SubmissionGateway,
};
pub use session::{FormSession, NavOutcome, NavRecord, ProgressSummary};
pub use transform::{inbound, outbound, parse_path, PathSegment, TransformMap};
pub use visibility::{resolve, VisibleForm};
