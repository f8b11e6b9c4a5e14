use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::GateConfig;
use crate::logic::clock::Clock;
use crate::logic::errors::{GateError, NotRegisteredError};
use crate::logic::redirect::{Outcome, RedirectResolver};
use crate::model::{EndpointCatalog, EndpointRecord, VersionGraph, ViewCode};
use crate::store::traits::Store;

/// Result handed to the request layer for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "url", rename_all = "snake_case")]
pub enum GateDecision {
    Allow,
    /// The view is unavailable but a live replacement exists.
    Redirect(String),
    NotFound,
    /// The view is deprecated; send the caller to its replacement for good.
    GoneWithTarget(String),
    GoneNoTarget,
    TooEarly,
}

/// How a gated view identifies itself, the decorator arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRegistration {
    pub view_code: ViewCode,
    #[serde(default)]
    pub view_name: Option<String>,
    /// Explicit API/page classification; `None` keeps whatever is stored.
    #[serde(default)]
    pub is_api: Option<bool>,
    /// Overrides the configured `require_register` for this view.
    #[serde(default)]
    pub require_register: Option<bool>,
}

impl ViewRegistration {
    pub fn new(view_code: impl Into<ViewCode>) -> Self {
        Self {
            view_code: view_code.into(),
            view_name: None,
            is_api: None,
            require_register: None,
        }
    }

    pub fn api(mut self, is_api: bool) -> Self {
        self.is_api = Some(is_api);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.view_name = Some(name.into());
        self
    }

    pub fn require_register(mut self, required: bool) -> Self {
        self.require_register = Some(required);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateVerdict {
    pub view_code: ViewCode,
    pub decision: GateDecision,
    /// Response shape: JSON for API views, plain HTTP otherwise.
    pub is_api: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Everything one decision reads: all versions plus the requested view's chain.
#[derive(Debug, Clone, Default)]
pub struct GateSnapshot {
    pub graph: VersionGraph,
    pub catalog: EndpointCatalog,
}

impl GateSnapshot {
    pub async fn load<S: Store + ?Sized>(store: &S, code: &str) -> anyhow::Result<Self> {
        let graph = VersionGraph::from_versions(store.list_versions().await?);
        let mut catalog = EndpointCatalog::new();
        let mut next = Some(code.to_string());
        while let Some(code) = next.take() {
            // A repeated code means a cyclic chain; the resolver reports it.
            if catalog.contains(&code) {
                break;
            }
            let Some(record) = store.get_endpoint(&code).await? else {
                break;
            };
            next = record.new_compatible_view.clone();
            catalog.insert(record);
        }
        Ok(Self { graph, catalog })
    }
}

/// Request-time entry point into the version graph.
///
/// Holds no state between calls: every decision re-reads the store.
pub struct Gate<S: Store + ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: GateConfig,
}

impl<S: Store + ?Sized> Clone for Gate<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
        }
    }
}

impl<S: Store + ?Sized> Gate<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: GateConfig) -> Self {
        Self { store, clock, config }
    }

    /// Decide for a bare view code, optionally classifying it as an API view.
    pub async fn decide_code(&self, code: &str, is_api_hint: Option<bool>) -> Result<GateVerdict, GateError> {
        let mut registration = ViewRegistration::new(code);
        registration.is_api = is_api_hint;
        self.decide(&registration).await
    }

    pub async fn decide(&self, registration: &ViewRegistration) -> Result<GateVerdict, GateError> {
        let is_api = registration.is_api.unwrap_or(false);
        match self.resolve(registration).await {
            Ok((outcome, is_api, deprecated)) => {
                let decision = match outcome {
                    Outcome::NotRegistered | Outcome::Available => GateDecision::Allow,
                    Outcome::TooEarly => GateDecision::TooEarly,
                    Outcome::GoneWithTarget(url) if deprecated => GateDecision::GoneWithTarget(url),
                    Outcome::GoneWithTarget(url) => GateDecision::Redirect(url),
                    Outcome::GoneNoTarget => GateDecision::GoneNoTarget,
                };
                log::debug!("gate '{}': {:?}", registration.view_code, decision);
                Ok(GateVerdict {
                    view_code: registration.view_code.clone(),
                    decision,
                    is_api,
                    help: None,
                })
            }
            Err(GateError::NotRegistered(err)) => {
                log::info!("{}; answering not found", err);
                Ok(GateVerdict {
                    view_code: registration.view_code.clone(),
                    decision: GateDecision::NotFound,
                    is_api,
                    help: self.config.register_help_text.clone(),
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Outcome for the view plus its stored API flag and whether it is deprecated.
    ///
    /// Fails with [`NotRegisteredError`] when registration is required and missing.
    pub async fn resolve(&self, registration: &ViewRegistration) -> Result<(Outcome, bool, bool), GateError> {
        let code = registration.view_code.as_str();
        let is_api_hint = registration.is_api;

        match self.store.get_endpoint(code).await? {
            None => {
                let raced = if self.config.auto_register {
                    let placeholder = EndpointRecord::pending(
                        code,
                        registration.view_name.clone(),
                        is_api_hint.unwrap_or(false),
                    );
                    let inserted = self.store.insert_endpoint_if_absent(placeholder).await?;
                    if inserted {
                        log::info!("auto-registered pending view '{}'", code);
                    }
                    !inserted
                } else {
                    false
                };
                // A concurrent registration won; decide on what is stored now.
                if !raced {
                    let outcome = self.not_registered(registration)?;
                    return Ok((outcome, is_api_hint.unwrap_or(false), false));
                }
            }
            Some(record) if record.is_pending() => {
                let outcome = self.not_registered(registration)?;
                return Ok((outcome, record.is_api, false));
            }
            Some(record) => {
                if let Some(hint) = is_api_hint {
                    if record.is_api != hint && self.store.set_endpoint_is_api(code, hint).await? {
                        log::info!("view '{}' reclassified as is_api={}", code, hint);
                    }
                }
            }
        }

        let snapshot = GateSnapshot::load(&*self.store, code).await?;
        let Some(record) = snapshot.catalog.get(code).filter(|record| !record.is_pending()) else {
            // Deleted, or still a placeholder, between the two reads.
            let outcome = self.not_registered(registration)?;
            return Ok((outcome, is_api_hint.unwrap_or(false), false));
        };

        let mut resolver = RedirectResolver::new(&snapshot.graph, &snapshot.catalog, self.clock.now());
        let outcome = resolver.resolve(record)?;
        let deprecated = resolver.availability().endpoint_deprecated(record)?;
        Ok((outcome, record.is_api, deprecated))
    }

    fn not_registered(&self, registration: &ViewRegistration) -> Result<Outcome, NotRegisteredError> {
        let required = registration
            .require_register
            .unwrap_or(self.config.require_register);
        if required {
            return Err(NotRegisteredError {
                code: registration.view_code.clone(),
            });
        }
        log::warn!(
            "Not Registered! Please register view '{}' before serving it",
            registration.view_code
        );
        Ok(Outcome::NotRegistered)
    }
}
