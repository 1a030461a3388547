//! # Goods Lifecycle Engine
//!
//! Every lifecycle operation (register, ship, inspect, deliver) is a dual
//! write: a stage record in the relational store, then a contract call
//! through the chain gateway. The engine sequences the two so the store
//! never claims more than the chain has accepted:
//!
//! 1. **Resolve the actor.** The caller's user and company are loaded; the
//!    company type must match the stage and the company must hold a valid
//!    chain address.
//!
//! 2. **Check the lifecycle.** The good must be in the stage's required
//!    status and the previous stage must be confirmed on chain.
//!
//! 3. **Claim the stage.** The stage record is written as `submitting`.
//!    A claim is refused while another request holds a live one.
//!
//! 4. **Call the chain.** On success the record becomes `confirmed` and the
//!    good's status advances with a compare-and-set. On failure the record
//!    returns to `pending`, the good's status is untouched and the caller
//!    gets [`StageOutcome::PendingConfirmation`]. The reconciler or an
//!    explicit resubmit drives it later.
//!
//! The good's status therefore only ever advances after the chain confirms
//! the stage that produces it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use seatrace_chain_client::{ChainGateway, ContractCall, TxReceipt};
use seatrace_core::{BlockchainAddress, GoodId, GoodStatus, Stage};
use seatrace_state::{authorize_stage, plan_transition, require_predecessor_confirmed, LifecycleError};

use crate::auth::CallerIdentity;
use crate::commands::{DeliverGood, InspectGood, RegisterGood, ShipGood};
use crate::extractors::Validate;
use crate::model::{
    ClaimOutcome, Company, DeliveryData, Good, InspectionData, NewGood, PendingStage,
    ProductionData, StageActor, StageDraft, StagePayload, StageRecord, TransportData,
};
use crate::repository::{GoodsRepository, RepoError};
use crate::views::{summarize, GoodSummary};

/// Attempts at drawing an unused good id before registration gives up.
const GOOD_ID_ATTEMPTS: usize = 3;

// ---------------------------------------------------------------------------
// Errors and outcomes
// ---------------------------------------------------------------------------

/// Why a lifecycle operation was refused or could not complete.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Another request currently holds the stage's chain submission.
    #[error("{stage} of good {good_id} is already being submitted to the chain")]
    InFlight { good_id: GoodId, stage: Stage },

    /// The chain confirmed the stage but the good's status had moved on.
    #[error("good {good_id} is no longer {expected}, its status changed concurrently")]
    StatusConflict { good_id: GoodId, expected: GoodStatus },

    #[error("good {0} has no stage awaiting chain confirmation")]
    NothingToResubmit(GoodId),
}

/// Result of a lifecycle operation that passed every precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StageOutcome {
    /// Both writes landed; the good's status reflects the stage.
    Confirmed(GoodSummary),
    /// The stage record is stored but the chain has not accepted it yet.
    PendingConfirmation {
        summary: GoodSummary,
        stage: Stage,
        reason: String,
    },
}

impl StageOutcome {
    pub fn summary(&self) -> &GoodSummary {
        match self {
            Self::Confirmed(summary) => summary,
            Self::PendingConfirmation { summary, .. } => summary,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

/// The resolved operator of a stage.
#[derive(Debug, Clone)]
pub struct Actor {
    pub stage_actor: StageActor,
    pub company: Company,
    pub address: BlockchainAddress,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Timeouts governing chain submissions.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Upper bound on a single contract call.
    pub chain_timeout: Duration,
    /// Age after which a `submitting` claim is considered abandoned.
    pub submission_lease: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chain_timeout: Duration::from_secs(10),
            submission_lease: Duration::from_secs(60),
        }
    }
}

/// Runs lifecycle operations against a repository and a chain gateway.
#[derive(Clone)]
pub struct LifecycleEngine {
    repo: Arc<dyn GoodsRepository>,
    gateway: Arc<dyn ChainGateway>,
    settings: EngineSettings,
}

impl std::fmt::Debug for LifecycleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleEngine")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LifecycleEngine {
    pub fn new(
        repo: Arc<dyn GoodsRepository>,
        gateway: Arc<dyn ChainGateway>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            repo,
            gateway,
            settings,
        }
    }

    /// Register a new good on behalf of a Producer company.
    pub async fn register(
        &self,
        identity: &CallerIdentity,
        cmd: RegisterGood,
    ) -> Result<StageOutcome, EngineError> {
        cmd.validate().map_err(EngineError::Validation)?;
        let expiry_date = cmd.expiry().map_err(EngineError::Validation)?;

        let actor = self.resolve_actor(identity).await?;
        authorize_stage(actor.company.company_type, Stage::Production)?;

        let payload = StagePayload::Production(ProductionData {
            location: cmd.location,
            produced_at: Utc::now(),
            batch_info: cmd.batch_info,
            quality_level: cmd.quality_level,
            expiry_date,
        });

        let mut attempt = 0;
        let (good, record) = loop {
            attempt += 1;
            let good_id = GoodId::generate_now(actor.company.id);
            let new_good = NewGood {
                good_id: good_id.clone(),
                good_name: cmd.good_name.trim().to_string(),
                batch_number: cmd.batch_number.trim().to_string(),
                description: cmd.description.clone(),
                owner_company_id: actor.company.id,
            };
            let draft = StageDraft {
                good_id: good_id.clone(),
                actor: actor.stage_actor.clone(),
                payload: payload.clone(),
            };
            match self.repo.create_good(new_good, draft).await {
                Ok(created) => break created,
                Err(RepoError::DuplicateGoodId(id)) if attempt < GOOD_ID_ATTEMPTS => {
                    tracing::warn!(good_id = %id, attempt, "generated good id collided, drawing another");
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(
            good_id = %good.good_id,
            company_id = actor.company.id.get(),
            "good registered, submitting to chain"
        );
        self.submit(good, record, &actor.address).await
    }

    /// Record shipment of a produced good (Shipper companies).
    pub async fn ship(
        &self,
        identity: &CallerIdentity,
        cmd: ShipGood,
    ) -> Result<StageOutcome, EngineError> {
        cmd.validate().map_err(EngineError::Validation)?;
        let payload = StagePayload::Transport(TransportData {
            start_location: cmd.start_location,
            end_location: cmd.end_location,
            transport_info: cmd.transport_info,
            start_time: Utc::now(),
            end_time: cmd.end_time,
            actual_arrival_time: None,
            tracking_number: cmd.tracking_number,
        });
        self.run_stage(identity, &cmd.good_id, payload).await
    }

    /// Record inspection of a shipped good (Port companies).
    ///
    /// A failed inspection (`pass_status == false`) is still a completed
    /// inspection and advances the good.
    pub async fn inspect(
        &self,
        identity: &CallerIdentity,
        cmd: InspectGood,
    ) -> Result<StageOutcome, EngineError> {
        cmd.validate().map_err(EngineError::Validation)?;
        let payload = StagePayload::Inspection(InspectionData {
            inspection_info: cmd.inspection_info,
            quality_score: cmd.quality_score,
            pass_status: cmd.pass_status,
            inspection_time: Utc::now(),
            location: cmd.location,
            notes: cmd.notes,
        });
        self.run_stage(identity, &cmd.good_id, payload).await
    }

    /// Record delivery of an inspected good (Dealer companies).
    pub async fn deliver(
        &self,
        identity: &CallerIdentity,
        cmd: DeliverGood,
    ) -> Result<StageOutcome, EngineError> {
        cmd.validate().map_err(EngineError::Validation)?;
        let payload = StagePayload::Delivery(DeliveryData {
            delivery_info: cmd.delivery_info,
            recipient_name: cmd.recipient_name,
            recipient_contact: cmd.recipient_contact,
            delivery_time: Utc::now(),
            location: cmd.location,
            notes: cmd.notes,
        });
        self.run_stage(identity, &cmd.good_id, payload).await
    }

    /// Re-drive the earliest unconfirmed stage of a good.
    ///
    /// Only the company that performed that stage may resubmit it. The
    /// stored payload is resubmitted unchanged.
    pub async fn resubmit(
        &self,
        identity: &CallerIdentity,
        raw_good_id: &str,
    ) -> Result<StageOutcome, EngineError> {
        let good_id = parse_good_id(raw_good_id)?;
        let actor = self.resolve_actor(identity).await?;
        let good = self.load_good(&good_id).await?;

        let records = self.repo.stage_records(&good_id).await?;
        let record = records
            .first_unconfirmed()
            .ok_or_else(|| EngineError::NothingToResubmit(good_id.clone()))?;
        let stage = record.stage();
        if record.company_id != actor.company.id {
            return Err(EngineError::Forbidden(format!(
                "{stage} of good {good_id} was performed by another company"
            )));
        }

        tracing::info!(good_id = %good_id, stage = %stage, "resubmitting stage to chain");
        self.reclaim_and_submit(good, stage, &actor.address).await
    }

    /// Re-drive an unconfirmed stage found by the reconciler.
    ///
    /// Submits under the chain address of the company that performed it.
    pub async fn redrive(&self, pending: &PendingStage) -> Result<StageOutcome, EngineError> {
        let company = self
            .repo
            .company(pending.company_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("company {}", pending.company_id.get())))?;
        let address = company_address(&company)?;
        let good = self.load_good(&pending.good_id).await?;
        self.reclaim_and_submit(good, pending.stage, &address).await
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Load the caller's user and company and check they may operate.
    pub async fn resolve_actor(&self, identity: &CallerIdentity) -> Result<Actor, EngineError> {
        if !identity.role.can_operate() {
            return Err(EngineError::Forbidden(format!(
                "role {} cannot perform lifecycle operations",
                identity.role
            )));
        }
        let company_id = identity.company_id.ok_or_else(|| {
            EngineError::Forbidden("caller is not attached to a company".to_string())
        })?;
        let user_id = identity
            .user_id
            .ok_or_else(|| EngineError::Unauthorized("caller has no user id".to_string()))?;

        let user = self
            .repo
            .user(user_id)
            .await?
            .ok_or_else(|| EngineError::Unauthorized(format!("unknown user {}", user_id.get())))?;
        if user.company_id != Some(company_id) {
            return Err(EngineError::Forbidden(format!(
                "user {} does not belong to company {}",
                user_id.get(),
                company_id.get()
            )));
        }
        if !user.role.can_operate() {
            return Err(EngineError::Forbidden(format!(
                "user {} has role {} and cannot perform lifecycle operations",
                user_id.get(),
                user.role
            )));
        }

        let company = self
            .repo
            .company(company_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("company {}", company_id.get())))?;
        let address = company_address(&company)?;

        Ok(Actor {
            stage_actor: StageActor {
                company_id,
                operator_id: user.id,
                operator_name: user.display_name().to_string(),
            },
            company,
            address,
        })
    }

    async fn load_good(&self, good_id: &GoodId) -> Result<Good, EngineError> {
        self.repo
            .good(good_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("good {good_id}")))
    }

    /// Shared path of ship, inspect and deliver.
    async fn run_stage(
        &self,
        identity: &CallerIdentity,
        raw_good_id: &str,
        payload: StagePayload,
    ) -> Result<StageOutcome, EngineError> {
        let stage = payload.stage();
        let good_id = parse_good_id(raw_good_id)?;

        let actor = self.resolve_actor(identity).await?;
        authorize_stage(actor.company.company_type, stage)?;

        let good = self.load_good(&good_id).await?;
        plan_transition(&good_id, good.status, stage)?;

        let records = self.repo.stage_records(&good_id).await?;
        let predecessor_status = stage
            .predecessor()
            .and_then(|p| records.get(p))
            .map(|r| r.chain_status);
        require_predecessor_confirmed(&good_id, stage, predecessor_status)?;

        let draft = StageDraft {
            good_id: good_id.clone(),
            actor: actor.stage_actor,
            payload,
        };
        match self.repo.claim_stage(&draft, self.lease_cutoff()).await? {
            ClaimOutcome::Claimed(record) => self.submit(good, record, &actor.address).await,
            ClaimOutcome::AlreadyConfirmed(record) => {
                // Chain write landed earlier but the status advance did not.
                self.finish(&good_id, stage, &record.blockchain_tx_hash).await
            }
            ClaimOutcome::InFlight => Err(EngineError::InFlight { good_id, stage }),
        }
    }

    async fn reclaim_and_submit(
        &self,
        good: Good,
        stage: Stage,
        address: &BlockchainAddress,
    ) -> Result<StageOutcome, EngineError> {
        match self
            .repo
            .reclaim_stage(&good.good_id, stage, self.lease_cutoff())
            .await?
        {
            ClaimOutcome::Claimed(record) => self.submit(good, record, address).await,
            ClaimOutcome::AlreadyConfirmed(record) => {
                self.finish(&good.good_id, stage, &record.blockchain_tx_hash)
                    .await
            }
            ClaimOutcome::InFlight => Err(EngineError::InFlight {
                good_id: good.good_id,
                stage,
            }),
        }
    }

    /// Call the chain for a claimed record and settle both stores.
    async fn submit(
        &self,
        good: Good,
        record: StageRecord,
        address: &BlockchainAddress,
    ) -> Result<StageOutcome, EngineError> {
        let stage = record.stage();
        let call = contract_call(&good, &record, address);

        let invoked = tokio::time::timeout(self.settings.chain_timeout, self.gateway.invoke(&call));
        let reason = match invoked.await {
            Ok(Ok(receipt)) if receipt.is_success() => {
                return self.confirm(&good.good_id, stage, &receipt).await;
            }
            Ok(Ok(receipt)) => format!(
                "{} was not executed: {} (tx {})",
                call.function.name(),
                receipt.message,
                receipt.transaction_hash
            ),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "{} timed out after {:?}",
                call.function.name(),
                self.settings.chain_timeout
            ),
        };

        tracing::warn!(
            good_id = %good.good_id,
            stage = %stage,
            reason = %reason,
            "chain write failed, stage left pending"
        );
        self.repo
            .release_stage(&good.good_id, stage, &reason)
            .await?;
        record_outcome(stage, "pending");

        let good = self.load_good(&good.good_id).await?;
        Ok(StageOutcome::PendingConfirmation {
            summary: summarize(self.repo.as_ref(), &good).await,
            stage,
            reason,
        })
    }

    async fn confirm(
        &self,
        good_id: &GoodId,
        stage: Stage,
        receipt: &TxReceipt,
    ) -> Result<StageOutcome, EngineError> {
        if let Err(e) = self
            .repo
            .confirm_stage(good_id, stage, &receipt.transaction_hash)
            .await
        {
            tracing::error!(
                good_id = %good_id,
                stage = %stage,
                tx_hash = %receipt.transaction_hash,
                error = %e,
                "chain accepted the stage but confirming it in the store failed"
            );
            return Err(e.into());
        }
        self.finish(good_id, stage, &receipt.transaction_hash).await
    }

    /// Advance the good's status for a confirmed stage.
    async fn finish(
        &self,
        good_id: &GoodId,
        stage: Stage,
        tx_hash: &str,
    ) -> Result<StageOutcome, EngineError> {
        let to = stage.resulting_status();
        let from = stage.required_status().unwrap_or(to);

        if !self.repo.advance_status(good_id, from, to, tx_hash).await? {
            let good = self.load_good(good_id).await?;
            if good.status != to {
                tracing::error!(
                    good_id = %good_id,
                    stage = %stage,
                    status = %good.status,
                    "stage confirmed on chain but the good moved out of {from}"
                );
                return Err(EngineError::StatusConflict {
                    good_id: good_id.clone(),
                    expected: from,
                });
            }
        }

        tracing::info!(good_id = %good_id, stage = %stage, tx_hash = %tx_hash, "stage confirmed");
        record_outcome(stage, "confirmed");

        let good = self.load_good(good_id).await?;
        Ok(StageOutcome::Confirmed(
            summarize(self.repo.as_ref(), &good).await,
        ))
    }

    fn lease_cutoff(&self) -> chrono::DateTime<Utc> {
        let lease = chrono::Duration::from_std(self.settings.submission_lease)
            .unwrap_or(chrono::Duration::seconds(60));
        Utc::now() - lease
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_good_id(raw: &str) -> Result<GoodId, EngineError> {
    GoodId::new(raw.trim()).map_err(|e| EngineError::Validation(e.to_string()))
}

fn company_address(company: &Company) -> Result<BlockchainAddress, EngineError> {
    BlockchainAddress::parse(&company.blockchain_address).map_err(|_| {
        EngineError::Forbidden(format!(
            "company {} has no valid blockchain address",
            company.id.get()
        ))
    })
}

/// The contract call attesting `record`.
fn contract_call(good: &Good, record: &StageRecord, address: &BlockchainAddress) -> ContractCall {
    let argument = record.payload.chain_argument(good);
    let user = address.as_str();
    match record.stage() {
        Stage::Production => ContractCall::register_good(&good.good_id, argument, user),
        Stage::Transport => ContractCall::ship_good(&good.good_id, argument, user),
        Stage::Inspection => ContractCall::inspect_good(&good.good_id, argument, user),
        Stage::Delivery => ContractCall::deliver_good(&good.good_id, argument, user),
    }
}

fn record_outcome(stage: Stage, outcome: &'static str) {
    metrics::counter!(
        "seatrace_stage_outcomes_total",
        "stage" => stage.as_str(),
        "outcome" => outcome
    )
    .increment(1);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use seatrace_chain_client::{ChainError, ChainTrace};
    use seatrace_core::{ChainStatus, CompanyId, CompanyType, UserId};

    use crate::auth::Role;
    use crate::repository::MemoryRepository;

    const PRODUCER_ADDR: &str = "0x1111111111111111111111111111111111111111";
    const SHIPPER_ADDR: &str = "0x2222222222222222222222222222222222222222";

    /// Gateway that answers writes from a script, defaulting to success.
    #[derive(Default)]
    struct ScriptedGateway {
        failures: Mutex<Vec<ChainError>>,
        calls: Mutex<Vec<ContractCall>>,
        counter: AtomicUsize,
        stall_next: AtomicBool,
    }

    impl ScriptedGateway {
        fn fail_next(&self, err: ChainError) {
            self.failures.lock().push(err);
        }

        fn calls(&self) -> Vec<ContractCall> {
            self.calls.lock().clone()
        }

        /// The next write never answers.
        fn stall_next(&self) {
            self.stall_next.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ChainGateway for ScriptedGateway {
        async fn invoke(&self, call: &ContractCall) -> Result<TxReceipt, ChainError> {
            self.calls.lock().push(call.clone());
            if self.stall_next.swap(false, Ordering::SeqCst) {
                return std::future::pending().await;
            }
            if let Some(err) = self.failures.lock().pop() {
                return Err(err);
            }
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(TxReceipt {
                transaction_hash: format!("0xtx{n}"),
                message: "Success".to_string(),
            })
        }

        async fn full_trace(&self, good_id: &GoodId) -> Result<ChainTrace, ChainError> {
            Err(ChainError::Decode {
                endpoint: "getFullTrace".to_string(),
                detail: format!("no trace for {good_id}"),
            })
        }

        async fn good_status(&self, _good_id: &GoodId) -> Result<GoodStatus, ChainError> {
            Ok(GoodStatus::Produced)
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(1)
        }

        async fn transaction(&self, _hash: &str) -> Result<serde_json::Value, ChainError> {
            Ok(serde_json::Value::Null)
        }
    }

    fn rejected() -> ChainError {
        ChainError::Rejected {
            function: "registerGood".to_string(),
            code: 201,
            message: "node unavailable".to_string(),
        }
    }

    struct Fixture {
        repo: Arc<MemoryRepository>,
        gateway: Arc<ScriptedGateway>,
        engine: LifecycleEngine,
        producer: CallerIdentity,
        shipper: CallerIdentity,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(MemoryRepository::new());
        let producer_co = repo.insert_company("Harbor Fisheries", CompanyType::Producer, PRODUCER_ADDR);
        let shipper_co = repo.insert_company("Blue Freight", CompanyType::Shipper, SHIPPER_ADDR);
        let alice = repo.insert_user("alice", "Alice Chen", Role::Operator, Some(producer_co.id));
        let bob = repo.insert_user("bob", "", Role::Operator, Some(shipper_co.id));

        let gateway = Arc::new(ScriptedGateway::default());
        let engine = LifecycleEngine::new(repo.clone(), gateway.clone(), EngineSettings::default());
        Fixture {
            repo,
            gateway,
            engine,
            producer: operator(alice.id, producer_co.id),
            shipper: operator(bob.id, shipper_co.id),
        }
    }

    fn operator(user: UserId, company: CompanyId) -> CallerIdentity {
        CallerIdentity {
            role: Role::Operator,
            user_id: Some(user),
            company_id: Some(company),
        }
    }

    fn register_cmd() -> RegisterGood {
        RegisterGood {
            good_name: "Yellow croaker".to_string(),
            batch_number: "B-7".to_string(),
            location: "Zhoushan".to_string(),
            ..Default::default()
        }
    }

    fn ship_cmd(good_id: &str) -> ShipGood {
        ShipGood {
            good_id: good_id.to_string(),
            start_location: "Zhoushan".to_string(),
            end_location: "Ningbo".to_string(),
            transport_info: "cold chain truck".to_string(),
            end_time: None,
            tracking_number: "TN-1".to_string(),
        }
    }

    // ── Register ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn register_confirms_and_records_hash() {
        let f = fixture();
        let outcome = f.engine.register(&f.producer, register_cmd()).await.unwrap();

        let summary = outcome.summary();
        assert!(outcome.is_confirmed());
        assert_eq!(summary.status, 1);
        assert_eq!(summary.owner_company, "Harbor Fisheries");
        assert_eq!(summary.blockchain_tx_hash, "0xtx0");

        let calls = f.gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name(), "registerGood");
        assert_eq!(calls[0].user, PRODUCER_ADDR);

        let good_id = GoodId::new(summary.good_id.clone()).unwrap();
        let records = f.repo.stage_records(&good_id).await.unwrap();
        let production = records.production.unwrap();
        assert_eq!(production.chain_status, ChainStatus::Confirmed);
        assert_eq!(production.operator_name, "Alice Chen");
    }

    #[tokio::test]
    async fn register_rejects_empty_name_before_any_write() {
        let f = fixture();
        let cmd = RegisterGood {
            good_name: "   ".to_string(),
            ..register_cmd()
        };
        let err = f.engine.register(&f.producer, cmd).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(f.repo.stage_count(), 0);
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn shipper_cannot_register() {
        let f = fixture();
        let err = f.engine.register(&f.shipper, register_cmd()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle(LifecycleError::WrongCompanyType { .. })
        ));
        assert_eq!(f.repo.stage_count(), 0);
    }

    #[tokio::test]
    async fn super_admin_cannot_operate() {
        let f = fixture();
        let err = f
            .engine
            .register(&CallerIdentity::development(), register_cmd())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn company_without_address_is_forbidden() {
        let f = fixture();
        let co = f.repo.insert_company("No Wallet Co", CompanyType::Producer, "");
        let user = f.repo.insert_user("carol", "Carol", Role::Operator, Some(co.id));
        let err = f
            .engine
            .register(&operator(user.id, co.id), register_cmd())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn user_of_another_company_is_forbidden() {
        let f = fixture();
        let mut identity = f.shipper.clone();
        identity.company_id = f.producer.company_id;
        let err = f.engine.register(&identity, register_cmd()).await.unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    // ── Chain failures ───────────────────────────────────────────────

    #[tokio::test]
    async fn chain_failure_leaves_stage_pending_and_status_unchanged() {
        let f = fixture();
        let registered = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let good_id = registered.summary().good_id.clone();

        f.gateway.fail_next(rejected());
        let outcome = f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap();
        match &outcome {
            StageOutcome::PendingConfirmation { summary, stage, reason } => {
                assert_eq!(*stage, Stage::Transport);
                assert_eq!(summary.status, 1);
                assert!(reason.contains("node unavailable"));
            }
            other => panic!("expected pending outcome, got {other:?}"),
        }

        let gid = GoodId::new(good_id).unwrap();
        let transport = f.repo.stage_records(&gid).await.unwrap().transport.unwrap();
        assert_eq!(transport.chain_status, ChainStatus::Pending);
        assert_eq!(transport.chain_attempts, 1);
        assert_eq!(transport.blockchain_tx_hash, "");
    }

    #[tokio::test]
    async fn stalled_chain_write_times_out_to_pending() {
        let f = fixture();
        let settings = EngineSettings {
            chain_timeout: Duration::from_millis(50),
            ..EngineSettings::default()
        };
        let engine = LifecycleEngine::new(f.repo.clone(), f.gateway.clone(), settings);
        let registered = engine.register(&f.producer, register_cmd()).await.unwrap();
        let good_id = registered.summary().good_id.clone();

        f.gateway.stall_next();
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            engine.ship(&f.shipper, ship_cmd(&good_id)),
        )
        .await
        .expect("ship must give up on a stalled gateway")
        .unwrap();
        match &outcome {
            StageOutcome::PendingConfirmation { summary, stage, reason } => {
                assert_eq!(*stage, Stage::Transport);
                assert_eq!(summary.status, 1);
                assert!(reason.contains("timed out after 50ms"), "{reason}");
            }
            other => panic!("expected pending outcome, got {other:?}"),
        }

        let gid = GoodId::new(good_id).unwrap();
        let transport = f.repo.stage_records(&gid).await.unwrap().transport.unwrap();
        assert_eq!(transport.chain_status, ChainStatus::Pending);
        assert_eq!(transport.chain_attempts, 1);
        assert_eq!(transport.blockchain_tx_hash, "");
        let good = f.repo.good(&gid).await.unwrap().unwrap();
        assert_eq!(good.status, GoodStatus::Produced);
        assert_eq!(good.blockchain_tx_hash, registered.summary().blockchain_tx_hash);
    }

    #[tokio::test]
    async fn unsuccessful_receipt_is_not_a_confirmation() {
        struct Reverting;

        #[async_trait]
        impl ChainGateway for Reverting {
            async fn invoke(&self, _call: &ContractCall) -> Result<TxReceipt, ChainError> {
                Ok(TxReceipt {
                    transaction_hash: "0xdead".to_string(),
                    message: "execution reverted".to_string(),
                })
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

        let f = fixture();
        let engine = LifecycleEngine::new(f.repo.clone(), Arc::new(Reverting), EngineSettings::default());
        let outcome = engine.register(&f.producer, register_cmd()).await.unwrap();
        assert!(!outcome.is_confirmed());
        assert_eq!(outcome.summary().blockchain_tx_hash, "");
    }

    #[tokio::test]
    async fn resubmit_confirms_pending_stage() {
        let f = fixture();
        f.gateway.fail_next(rejected());
        let outcome = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        assert!(!outcome.is_confirmed());
        let good_id = outcome.summary().good_id.clone();

        // Shipping waits for the production record to be confirmed.
        let err = f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle(LifecycleError::PredecessorUnconfirmed { .. })
        ));

        let resubmitted = f.engine.resubmit(&f.producer, &good_id).await.unwrap();
        assert!(resubmitted.is_confirmed());
        assert!(!resubmitted.summary().blockchain_tx_hash.is_empty());

        let shipped = f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap();
        assert_eq!(shipped.summary().status, 2);
    }

    #[tokio::test]
    async fn resubmit_by_another_company_is_forbidden() {
        let f = fixture();
        f.gateway.fail_next(rejected());
        let outcome = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let err = f
            .engine
            .resubmit(&f.shipper, &outcome.summary().good_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn resubmit_with_nothing_pending_conflicts() {
        let f = fixture();
        let outcome = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let err = f
            .engine
            .resubmit(&f.producer, &outcome.summary().good_id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NothingToResubmit(_)));
    }

    // ── Ordering ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn repeated_ship_is_rejected() {
        let f = fixture();
        let registered = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let good_id = registered.summary().good_id.clone();
        f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap();

        let err = f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Lifecycle(LifecycleError::InvalidTransition { .. })
        ));
        assert_eq!(f.gateway.calls().len(), 2);
    }

    #[tokio::test]
    async fn ship_unknown_good_is_not_found() {
        let f = fixture();
        let err = f
            .engine
            .ship(&f.shipper, ship_cmd("G2020101012345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn live_claim_blocks_a_second_submission() {
        let f = fixture();
        let registered = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let good_id = GoodId::new(registered.summary().good_id.clone()).unwrap();

        // A request that crashed mid-call leaves a fresh `submitting` claim.
        let actor = f.engine.resolve_actor(&f.shipper).await.unwrap();
        let draft = StageDraft {
            good_id: good_id.clone(),
            actor: actor.stage_actor,
            payload: StagePayload::Transport(TransportData {
                start_location: "a".to_string(),
                end_location: "b".to_string(),
                transport_info: "c".to_string(),
                start_time: Utc::now(),
                end_time: None,
                actual_arrival_time: None,
                tracking_number: String::new(),
            }),
        };
        let claim = f.repo.claim_stage(&draft, Utc::now() - chrono::Duration::seconds(60)).await.unwrap();
        assert!(matches!(claim, ClaimOutcome::Claimed(_)));

        let err = f
            .engine
            .ship(&f.shipper, ship_cmd(good_id.as_str()))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InFlight { stage: Stage::Transport, .. }));
    }

    #[tokio::test]
    async fn redrive_confirms_with_the_performing_company_address() {
        let f = fixture();
        let registered = f.engine.register(&f.producer, register_cmd()).await.unwrap();
        let good_id = registered.summary().good_id.clone();
        f.gateway.fail_next(rejected());
        f.engine.ship(&f.shipper, ship_cmd(&good_id)).await.unwrap();

        let pending = f
            .repo
            .list_unconfirmed(Utc::now() - chrono::Duration::seconds(60), 10)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let outcome = f.engine.redrive(&pending[0]).await.unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(outcome.summary().status, 2);
        let last = f.gateway.calls().pop().unwrap();
        assert_eq!(last.user, SHIPPER_ADDR);
    }
}
