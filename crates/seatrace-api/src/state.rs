//! # Application State
//!
//! [`AppState`] is cloned into every handler. It holds the persistence and
//! chain seams as trait objects plus the two services built on them, so
//! tests swap in the in-memory repository and a scripted gateway without
//! touching the router.

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use zeroize::Zeroizing;

use seatrace_chain_client::ChainGateway;

use crate::lifecycle::{EngineSettings, LifecycleEngine};
use crate::reconcile::ReconcileConfig;
use crate::repository::GoodsRepository;
use crate::trace::TraceAssembler;

/// Headroom a submission lease keeps over the chain timeout, so a claim
/// whose chain call is still running is never taken over.
pub const LEASE_MARGIN: Duration = Duration::from_secs(5);

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<Zeroizing<String>>,
    /// Upper bound on every chain gateway call made by the engine and the
    /// trace assembler.
    pub chain_timeout: Duration,
    /// Whether traces include the chain's own record of the good.
    pub chain_trace_enabled: bool,
    /// Reconciliation worker settings, including the submission lease.
    pub reconcile: ReconcileConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("chain_timeout", &self.chain_timeout)
            .field("chain_trace_enabled", &self.chain_trace_enabled)
            .field("reconcile", &self.reconcile)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            chain_timeout: Duration::from_secs(seatrace_chain_client::config::DEFAULT_TIMEOUT_SECS),
            chain_trace_enabled: true,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN`, `CHAIN_TIMEOUT_SECS`, `CHAIN_TRACE_ENABLED`
    /// and the reconciliation variables. Unparseable values fall back to
    /// their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);

        let auth_token = std::env::var("AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Zeroizing::new);

        let chain_timeout = std::env::var("CHAIN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.chain_timeout);

        let chain_trace_enabled = std::env::var("CHAIN_TRACE_ENABLED")
            .ok()
            .map(|s| !matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(defaults.chain_trace_enabled);

        Self {
            port,
            auth_token,
            chain_timeout,
            chain_trace_enabled,
            reconcile: ReconcileConfig::from_env(),
        }
        .with_safe_lease()
    }

    /// Raise the submission lease to at least `chain_timeout + LEASE_MARGIN`.
    ///
    /// A shorter lease lets the reconciler reclaim a stage whose chain call
    /// is still in flight and submit it a second time.
    pub fn with_safe_lease(mut self) -> Self {
        let floor = self.chain_timeout + LEASE_MARGIN;
        if self.reconcile.submission_lease < floor {
            tracing::warn!(
                configured_secs = self.reconcile.submission_lease.as_secs(),
                chain_timeout_secs = self.chain_timeout.as_secs(),
                raised_to_secs = floor.as_secs(),
                "SUBMISSION_LEASE_SECS does not cover the chain timeout, raising it"
            );
            self.reconcile.submission_lease = floor;
        }
        self
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            chain_timeout: self.chain_timeout,
            submission_lease: self.reconcile.submission_lease,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn GoodsRepository>,
    pub gateway: Arc<dyn ChainGateway>,
    pub engine: LifecycleEngine,
    pub tracer: TraceAssembler,
    pub config: AppConfig,
    /// Renders `/metrics`; `None` when no Prometheus recorder is installed.
    pub metrics_handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("metrics", &self.metrics_handle.is_some())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repo: Arc<dyn GoodsRepository>,
        gateway: Arc<dyn ChainGateway>,
    ) -> Self {
        let engine = LifecycleEngine::new(repo.clone(), gateway.clone(), config.engine_settings());
        let tracer = TraceAssembler::new(
            repo.clone(),
            gateway.clone(),
            config.chain_trace_enabled,
            config.chain_timeout,
        );
        Self {
            repo,
            gateway,
            engine,
            tracer,
            config,
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}
