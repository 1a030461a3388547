//! # Persisted Records
//!
//! The rows owned by the persistence layer, as the rest of the crate sees
//! them. Both repository implementations produce exactly these types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use seatrace_core::{ChainStatus, CompanyId, CompanyType, GoodId, GoodStatus, Stage, UserId};

use crate::auth::Role;

/// A participating company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub company_type: CompanyType,
    pub contact_person: String,
    pub contact_phone: String,
    /// Identity presented to the chain gateway; may be empty until issued.
    pub blockchain_address: String,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub real_name: String,
    pub role: Role,
    /// `None` only for `super_admin`.
    pub company_id: Option<CompanyId>,
}

impl User {
    /// Name recorded as the operator of a stage.
    pub fn display_name(&self) -> &str {
        if self.real_name.trim().is_empty() {
            &self.username
        } else {
            &self.real_name
        }
    }
}

/// A tracked good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Good {
    /// Surrogate key.
    pub id: i64,
    pub good_id: GoodId,
    pub good_name: String,
    pub batch_number: String,
    pub description: String,
    pub owner_company_id: CompanyId,
    pub status: GoodStatus,
    /// Hash of the transaction behind the latest confirmed stage.
    pub blockchain_tx_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a good supplied at registration.
#[derive(Debug, Clone)]
pub struct NewGood {
    pub good_id: GoodId,
    pub good_name: String,
    pub batch_number: String,
    pub description: String,
    pub owner_company_id: CompanyId,
}

// ── Stage payloads ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionData {
    pub location: String,
    pub produced_at: DateTime<Utc>,
    pub batch_info: String,
    pub quality_level: String,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportData {
    pub start_location: String,
    pub end_location: String,
    pub transport_info: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub actual_arrival_time: Option<DateTime<Utc>>,
    pub tracking_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionData {
    pub inspection_info: String,
    pub quality_score: i32,
    pub pass_status: bool,
    pub inspection_time: DateTime<Utc>,
    pub location: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryData {
    pub delivery_info: String,
    pub recipient_name: String,
    pub recipient_contact: String,
    pub delivery_time: DateTime<Utc>,
    pub location: String,
    pub notes: String,
}

/// Stage-specific payload of a stage record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StagePayload {
    Production(ProductionData),
    Transport(TransportData),
    Inspection(InspectionData),
    Delivery(DeliveryData),
}

impl StagePayload {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Production(_) => Stage::Production,
            Self::Transport(_) => Stage::Transport,
            Self::Inspection(_) => Stage::Inspection,
            Self::Delivery(_) => Stage::Delivery,
        }
    }

    /// Second argument of the stage's contract function.
    ///
    /// Registration attests the good's name, which lives on the good
    /// rather than on the production record.
    pub fn chain_argument<'a>(&'a self, good: &'a Good) -> &'a str {
        match self {
            Self::Production(_) => &good.good_name,
            Self::Transport(d) => &d.transport_info,
            Self::Inspection(d) => &d.inspection_info,
            Self::Delivery(d) => &d.delivery_info,
        }
    }
}

// ── Stage records ───────────────────────────────────────────────────

/// Who performed a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageActor {
    pub company_id: CompanyId,
    pub operator_id: UserId,
    pub operator_name: String,
}

/// A stage record to be written (or re-claimed) before its chain call.
#[derive(Debug, Clone)]
pub struct StageDraft {
    pub good_id: GoodId,
    pub actor: StageActor,
    pub payload: StagePayload,
}

/// A persisted stage record with its chain confirmation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub id: i64,
    pub good_id: GoodId,
    pub company_id: CompanyId,
    pub operator_id: UserId,
    pub operator_name: String,
    pub chain_status: ChainStatus,
    pub chain_attempts: i32,
    pub last_chain_error: Option<String>,
    /// Empty until the chain confirms the stage.
    pub blockchain_tx_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub payload: StagePayload,
}

impl StageRecord {
    pub fn stage(&self) -> Stage {
        self.payload.stage()
    }

    pub fn is_confirmed(&self) -> bool {
        self.chain_status.is_confirmed()
    }
}

/// Result of trying to take ownership of a stage's chain submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This caller now holds the submission; the record is `submitting`.
    Claimed(StageRecord),
    /// The stage is already on chain; nothing to submit.
    AlreadyConfirmed(StageRecord),
    /// Another request holds a live claim.
    InFlight,
}

/// An unconfirmed stage awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStage {
    pub good_id: GoodId,
    pub stage: Stage,
    pub company_id: CompanyId,
    pub chain_status: ChainStatus,
    pub chain_attempts: i32,
}

/// Filter and page for the goods list.
#[derive(Debug, Clone, Default)]
pub struct GoodsQuery {
    /// `None` lists every company's goods.
    pub owner_company_id: Option<CompanyId>,
    pub status: Option<GoodStatus>,
    /// Case-insensitive substring over id, name, batch number and description.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// All stage records of one good.
#[derive(Debug, Clone, Default)]
pub struct StageRecords {
    pub production: Option<StageRecord>,
    pub transport: Option<StageRecord>,
    pub inspection: Option<StageRecord>,
    pub delivery: Option<StageRecord>,
}

impl StageRecords {
    pub fn get(&self, stage: Stage) -> Option<&StageRecord> {
        match stage {
            Stage::Production => self.production.as_ref(),
            Stage::Transport => self.transport.as_ref(),
            Stage::Inspection => self.inspection.as_ref(),
            Stage::Delivery => self.delivery.as_ref(),
        }
    }

    pub fn insert(&mut self, record: StageRecord) {
        let slot = match record.stage() {
            Stage::Production => &mut self.production,
            Stage::Transport => &mut self.transport,
            Stage::Inspection => &mut self.inspection,
            Stage::Delivery => &mut self.delivery,
        };
        *slot = Some(record);
    }

    /// The earliest stage whose record exists but is not chain-confirmed.
    pub fn first_unconfirmed(&self) -> Option<&StageRecord> {
        Stage::ALL
            .iter()
            .filter_map(|s| self.get(*s))
            .find(|r| !r.is_confirmed())
    }
}
