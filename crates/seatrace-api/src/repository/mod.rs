//! # Persistence Seam
//!
//! [`GoodsRepository`] is everything the lifecycle engine, the trace
//! assembler and the reconciler need from the relational store.
//! [`crate::db::PgRepository`] implements it on Postgres; [`MemoryRepository`]
//! implements it in process for development without `DATABASE_URL` and for
//! tests.
//!
//! ## Stage claims
//!
//! A stage record is written before its chain call and moves through
//! `pending → submitting → confirmed`. Writing a record is a *claim*: it
//! succeeds only when no record exists, the record is `pending`/`failed`,
//! or a `submitting` claim is older than the lease cutoff. This makes a
//! retried stage operation an upsert of the same row rather than a second
//! insert, and keeps two requests from submitting the same stage at once.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use seatrace_core::{CompanyId, GoodId, GoodStatus, Stage, UserId};

use crate::model::{
    ClaimOutcome, Company, Good, GoodsQuery, NewGood, PendingStage, StageDraft, StageRecord,
    StageRecords, User,
};

pub use memory::MemoryRepository;

/// Persistence failure.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The business identifier is already taken.
    #[error("good id {0} already exists")]
    DuplicateGoodId(String),

    #[error("{0} not found")]
    NotFound(String),

    /// A stored row could not be decoded into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Relational store operations used by the service.
#[async_trait]
pub trait GoodsRepository: Send + Sync {
    /// Round-trip to the store (readiness probe).
    async fn ping(&self) -> Result<(), RepoError>;

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, RepoError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, RepoError>;

    async fn good(&self, good_id: &GoodId) -> Result<Option<Good>, RepoError>;

    /// One page of goods, newest first, with the total matching count.
    async fn list_goods(&self, query: &GoodsQuery) -> Result<(i64, Vec<Good>), RepoError>;

    /// Insert a good in status `Produced` together with its production
    /// record, atomically. The production record starts out `submitting`,
    /// claimed by the registering request.
    ///
    /// Fails with [`RepoError::DuplicateGoodId`] when the id is taken.
    async fn create_good(
        &self,
        good: NewGood,
        production: StageDraft,
    ) -> Result<(Good, StageRecord), RepoError>;

    /// Every stage record of a good.
    async fn stage_records(&self, good_id: &GoodId) -> Result<StageRecords, RepoError>;

    /// Write the stage record for `draft` and claim its chain submission.
    ///
    /// A reclaimed record has its actor and payload replaced by the draft.
    async fn claim_stage(
        &self,
        draft: &StageDraft,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError>;

    /// Claim the chain submission of an existing record without touching
    /// its payload. Fails with [`RepoError::NotFound`] when it does not exist.
    async fn reclaim_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError>;

    /// Mark a claimed record `confirmed` and store its transaction hash.
    async fn confirm_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        tx_hash: &str,
    ) -> Result<(), RepoError>;

    /// Return a claimed record to `pending` after a failed chain call,
    /// counting the attempt.
    async fn release_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError>;

    /// Park a record as `failed`; only an explicit resubmit picks it up again.
    async fn mark_stage_failed(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError>;

    /// Conditional status update: set `status = to` and the latest hash
    /// only where the good is currently `from`. Returns whether a row
    /// changed. With `from == to` only the hash is written.
    async fn advance_status(
        &self,
        good_id: &GoodId,
        from: GoodStatus,
        to: GoodStatus,
        tx_hash: &str,
    ) -> Result<bool, RepoError>;

    /// Up to `limit` records awaiting a chain write, oldest first:
    /// every `pending` record and `submitting` records older than
    /// `lease_cutoff`.
    async fn list_unconfirmed(
        &self,
        lease_cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingStage>, RepoError>;
}

impl RepoError {
    pub(crate) fn stage_not_found(good_id: &GoodId, stage: Stage) -> Self {
        Self::NotFound(format!("{stage} record of good {good_id}"))
    }
}
