//! Reconciliation Worker
//!
//! Background service that re-drives stage records whose chain write has
//! not been confirmed. Each tick it:
//!
//! 1. Lists `pending` records and `submitting` records whose lease expired
//! 2. Parks records that exhausted their attempts as `failed`
//! 3. Re-drives the rest through the lifecycle engine, under the chain
//!    address of the company that performed the stage
//!
//! A `failed` record is only picked up again by an explicit resubmit.
//!
//! # Configuration
//!
//! - `RECONCILE_INTERVAL_SECS` - Tick interval (default: 30)
//! - `RECONCILE_BATCH_SIZE` - Max records per tick (default: 50)
//! - `RECONCILE_MAX_ATTEMPTS` - Attempts before a record is failed (default: 10)
//! - `SUBMISSION_LEASE_SECS` - Age after which a `submitting` claim is abandoned (default: 60)

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{EngineError, LifecycleEngine, StageOutcome};
use crate::repository::{GoodsRepository, RepoError};

/// Configuration for the reconciliation worker
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// How often to look for unconfirmed records
    pub interval: Duration,
    /// Maximum records re-driven per tick
    pub batch_size: i64,
    /// Chain attempts after which a record is parked as `failed`
    pub max_attempts: i32,
    /// Age after which a `submitting` claim may be taken over
    pub submission_lease: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            batch_size: 50,
            max_attempts: 10,
            submission_lease: Duration::from_secs(60),
        }
    }
}

impl ReconcileConfig {
    /// Load configuration from environment
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let interval = env_parse("RECONCILE_INTERVAL_SECS")
            .filter(|s: &u64| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval);

        let batch_size = env_parse("RECONCILE_BATCH_SIZE")
            .filter(|n: &i64| *n > 0)
            .unwrap_or(defaults.batch_size);

        let max_attempts = env_parse("RECONCILE_MAX_ATTEMPTS")
            .filter(|n: &i32| *n > 0)
            .unwrap_or(defaults.max_attempts);

        let submission_lease = env_parse("SUBMISSION_LEASE_SECS")
            .filter(|s: &u64| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.submission_lease);

        Self {
            interval,
            batch_size,
            max_attempts,
            submission_lease,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Message types for worker control
#[derive(Debug)]
pub enum ReconcileCommand {
    /// Run a pass now instead of waiting for the next tick
    RunNow,
    /// Shutdown the worker
    Shutdown,
}

/// What one pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub confirmed: usize,
    pub still_pending: usize,
    pub failed: usize,
    /// Records another request was already submitting.
    pub skipped: usize,
    pub errors: usize,
}

/// Reconciliation worker
pub struct Reconciler {
    config: ReconcileConfig,
    repo: Arc<dyn GoodsRepository>,
    engine: LifecycleEngine,
    control_tx: mpsc::Sender<ReconcileCommand>,
    control_rx: mpsc::Receiver<ReconcileCommand>,
}

impl Reconciler {
    pub fn new(
        config: ReconcileConfig,
        repo: Arc<dyn GoodsRepository>,
        engine: LifecycleEngine,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(16);
        Self {
            config,
            repo,
            engine,
            control_tx,
            control_rx,
        }
    }

    /// Get a sender handle for controlling the worker
    pub fn control_handle(&self) -> mpsc::Sender<ReconcileCommand> {
        self.control_tx.clone()
    }

    /// Run until told to shut down
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "starting reconciliation worker"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pass().await;
                }
                Some(cmd) = self.control_rx.recv() => {
                    match cmd {
                        ReconcileCommand::RunNow => {
                            info!("reconciliation pass requested");
                            self.pass().await;
                        }
                        ReconcileCommand::Shutdown => {
                            info!("reconciliation worker shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn pass(&self) {
        match self.run_once().await {
            Ok(report) if report == ReconcileReport::default() => {
                debug!("no unconfirmed stage records");
            }
            Ok(report) => info!(
                confirmed = report.confirmed,
                still_pending = report.still_pending,
                failed = report.failed,
                skipped = report.skipped,
                errors = report.errors,
                "reconciliation pass finished"
            ),
            Err(e) => error!(error = %e, "reconciliation pass failed"),
        }
    }

    /// One reconciliation pass over at most `batch_size` records.
    pub async fn run_once(&self) -> Result<ReconcileReport, RepoError> {
        let lease = chrono::Duration::from_std(self.config.submission_lease)
            .unwrap_or(chrono::Duration::seconds(60));
        let batch = self
            .repo
            .list_unconfirmed(Utc::now() - lease, self.config.batch_size)
            .await?;

        let mut report = ReconcileReport::default();
        for pending in batch {
            if pending.chain_attempts >= self.config.max_attempts {
                let reason = format!(
                    "gave up after {} chain attempts",
                    pending.chain_attempts
                );
                warn!(good_id = %pending.good_id, stage = %pending.stage, "{reason}");
                self.repo
                    .mark_stage_failed(&pending.good_id, pending.stage, &reason)
                    .await?;
                report.failed += 1;
                continue;
            }

            match self.engine.redrive(&pending).await {
                Ok(StageOutcome::Confirmed(_)) => report.confirmed += 1,
                Ok(StageOutcome::PendingConfirmation { .. }) => report.still_pending += 1,
                Err(EngineError::InFlight { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        good_id = %pending.good_id,
                        stage = %pending.stage,
                        error = %e,
                        "re-driving stage failed"
                    );
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }
}

/// Spawn the worker as a background task
pub fn spawn_reconciler(
    config: ReconcileConfig,
    repo: Arc<dyn GoodsRepository>,
    engine: LifecycleEngine,
) -> (tokio::task::JoinHandle<()>, mpsc::Sender<ReconcileCommand>) {
    let worker = Reconciler::new(config, repo, engine);
    let control_handle = worker.control_handle();
    let handle = tokio::spawn(worker.run());
    (handle, control_handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use seatrace_chain_client::{ChainError, ChainGateway, ChainTrace, ContractCall, TxReceipt};
    use seatrace_core::{ChainStatus, CompanyType, GoodId, GoodStatus, Stage};

    use crate::auth::{CallerIdentity, Role};
    use crate::commands::RegisterGood;
    use crate::lifecycle::EngineSettings;
    use crate::repository::MemoryRepository;

    /// Gateway that is down until switched on.
    #[derive(Default)]
    struct FlakyGateway {
        up: Mutex<bool>,
    }

    #[async_trait]
    impl ChainGateway for FlakyGateway {
        async fn invoke(&self, call: &ContractCall) -> Result<TxReceipt, ChainError> {
            if *self.up.lock() {
                Ok(TxReceipt {
                    transaction_hash: format!("0x{}", call.params[0]),
                    message: "Success".to_string(),
                })
            } else {
                Err(ChainError::Rejected {
                    function: call.function.name().to_string(),
                    code: -1,
                    message: "gateway down".to_string(),
                })
            }
        }
        async fn full_trace(&self, _g: &GoodId) -> Result<ChainTrace, ChainError> {
            unreachable!()
        }
        async fn good_status(&self, _g: &GoodId) -> Result<GoodStatus, ChainError> {
            unreachable!()
        }
        async fn block_number(&self) -> Result<u64, ChainError> {
            unreachable!()
        }
        async fn transaction(&self, _h: &str) -> Result<serde_json::Value, ChainError> {
            unreachable!()
        }
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        gateway: Arc<FlakyGateway>,
        reconciler: Reconciler,
        good_id: GoodId,
    }

    async fn fixture(max_attempts: i32) -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let company = repo.insert_company(
            "Harbor Fisheries",
            CompanyType::Producer,
            "0x1111111111111111111111111111111111111111",
        );
        let user = repo.insert_user("alice", "Alice", Role::Operator, Some(company.id));
        let gateway = Arc::new(FlakyGateway::default());
        let engine = LifecycleEngine::new(repo.clone(), gateway.clone(), EngineSettings::default());

        let identity = CallerIdentity {
            role: Role::Operator,
            user_id: Some(user.id),
            company_id: Some(company.id),
        };
        let outcome = engine
            .register(
                &identity,
                RegisterGood {
                    good_name: "Squid".to_string(),
                    location: "Dalian".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!outcome.is_confirmed());
        let good_id = GoodId::new(outcome.summary().good_id.clone()).unwrap();

        let config = ReconcileConfig {
            max_attempts,
            ..Default::default()
        };
        let reconciler = Reconciler::new(config, repo.clone(), engine);
        Fixture {
            repo,
            gateway,
            reconciler,
            good_id,
        }
    }

    #[test]
    fn config_default() {
        let config = ReconcileConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_attempts, 10);
    }

    #[tokio::test]
    async fn pass_confirms_once_gateway_recovers() {
        let f = fixture(10).await;

        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.still_pending, 1);

        *f.gateway.up.lock() = true;
        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.confirmed, 1);

        let good = f.repo.good(&f.good_id).await.unwrap().unwrap();
        assert_eq!(good.blockchain_tx_hash, format!("0x{}", f.good_id));
        let production = f.repo.stage_records(&f.good_id).await.unwrap().production.unwrap();
        assert_eq!(production.chain_status, ChainStatus::Confirmed);

        assert_eq!(f.reconciler.run_once().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn exhausted_records_are_parked_as_failed() {
        let f = fixture(2).await;

        // Registration counted one attempt, this pass counts the second.
        f.reconciler.run_once().await.unwrap();
        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.failed, 1);

        let production = f.repo.stage_records(&f.good_id).await.unwrap().production.unwrap();
        assert_eq!(production.chain_status, ChainStatus::Failed);
        assert_eq!(f.reconciler.run_once().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test]
    async fn expired_claim_is_taken_over() {
        let f = fixture(10).await;
        *f.gateway.up.lock() = true;

        // Simulate a request that died while holding the claim.
        f.repo
            .reclaim_stage(&f.good_id, Stage::Production, Utc::now())
            .await
            .unwrap();
        assert_eq!(f.reconciler.run_once().await.unwrap(), ReconcileReport::default());

        f.repo.backdate_stage(
            &f.good_id,
            Stage::Production,
            Utc::now() - chrono::Duration::minutes(5),
        );
        let report = f.reconciler.run_once().await.unwrap();
        assert_eq!(report.confirmed, 1);
    }

    #[tokio::test]
    async fn shutdown_stops_the_worker() {
        let f = fixture(10).await;
        let control = f.reconciler.control_handle();
        let handle = tokio::spawn(f.reconciler.run());
        control.send(ReconcileCommand::RunNow).await.unwrap();
        control.send(ReconcileCommand::Shutdown).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
