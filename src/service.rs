//! Boundary collaborators
//!
//! The core engine is synchronous and pure; the only suspension points are
//! at the system boundary: fetching a form config and handing off the
//! final payload. Both collaborators are injected as async traits so the
//! transport layer stays out of the core.
//!
//! Boundary calls follow last-dispatched-wins: a dispatch superseded by a
//! newer one reports `Superseded` instead of its result, so a stale config
//! fetch or submit response can never overwrite newer state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FormConfig;
use crate::error::ConfigError;
use crate::schema::ValidationFailure;
use crate::session::FormSession;

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read-only config lookup, keyed by form id. Absence is fatal for the
/// session that asked.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn fetch(&self, form_id: &str) -> Result<Arc<FormConfig>, ConfigError>;
}

/// Accepts the final submission payload. Returns the validated data or a
/// structured per-field error list; HTTP status mapping lives in the
/// transport layer, not here.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, form_id: &str, payload: Value) -> Result<Value, ValidationFailure>;
}

/// In-memory config store for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: HashMap<String, Arc<FormConfig>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, config: FormConfig) {
        self.configs
            .insert(config.metadata.id.clone(), Arc::new(config));
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn fetch(&self, form_id: &str) -> Result<Arc<FormConfig>, ConfigError> {
        self.configs
            .get(form_id)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                form_id: form_id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// FormService
// ---------------------------------------------------------------------------

/// Outcome of a boundary dispatch: the result, or notice that a newer
/// dispatch superseded this one while it was in flight.
#[derive(Debug)]
pub enum DispatchResult<T> {
    Completed(T),
    Superseded,
}

impl<T> DispatchResult<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded)
    }

    pub fn into_completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Superseded => None,
        }
    }
}

/// Boundary service: owns the collaborators and the dispatch generation.
pub struct FormService<S, G> {
    store: S,
    gateway: G,
    generation: AtomicU64,
}

impl<S: ConfigStore, G: SubmissionGateway> FormService<S, G> {
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            generation: AtomicU64::new(0),
        }
    }

    /// Fetch a config and open a session on it. Returns `Superseded` if a
    /// newer boundary call was dispatched while the fetch was in flight.
    pub async fn start_session(
        &self,
        form_id: &str,
    ) -> Result<DispatchResult<FormSession>, ConfigError> {
        let ticket = self.dispatch();
        let config = self.store.fetch(form_id).await?;
        if !self.is_current(ticket) {
            warn!(%form_id, "discarding superseded config fetch");
            return Ok(DispatchResult::Superseded);
        }
        debug!(%form_id, version = %config.metadata.version, "session started");
        Ok(DispatchResult::Completed(FormSession::new(config)))
    }

    /// As `start_session`, hydrating values from an external payload.
    pub async fn start_session_with_payload(
        &self,
        form_id: &str,
        payload: &Value,
    ) -> Result<DispatchResult<FormSession>, ConfigError> {
        let ticket = self.dispatch();
        let config = self.store.fetch(form_id).await?;
        if !self.is_current(ticket) {
            warn!(%form_id, "discarding superseded config fetch");
            return Ok(DispatchResult::Superseded);
        }
        Ok(DispatchResult::Completed(FormSession::with_inbound_payload(
            config, payload,
        )))
    }

    /// Validate the whole visible form and hand the outbound payload to the
    /// gateway. Local validation failure returns immediately; a gateway
    /// response that lost the race to a newer dispatch is discarded.
    pub async fn submit(
        &self,
        session: &mut FormSession,
    ) -> DispatchResult<Result<Value, ValidationFailure>> {
        let payload = match session.submit_payload() {
            Ok(payload) => payload,
            Err(failure) => return DispatchResult::Completed(Err(failure)),
        };
        let form_id = session.config().metadata.id.clone();
        let ticket = self.dispatch();
        let response = self.gateway.submit(&form_id, payload).await;
        if !self.is_current(ticket) {
            warn!(%form_id, "discarding superseded submit response");
            return DispatchResult::Superseded;
        }
        DispatchResult::Completed(response)
    }

    fn dispatch(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
