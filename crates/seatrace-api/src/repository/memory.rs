//! In-process [`GoodsRepository`] behind a `parking_lot::RwLock`.
//!
//! Mirrors the Postgres semantics that matter to the engine: unique good
//! ids, one record per stage per good, claim-by-upsert and conditional
//! status updates. Every operation takes the lock once, so each is atomic
//! with respect to the others.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use seatrace_core::{ChainStatus, CompanyId, CompanyType, GoodId, GoodStatus, Stage, UserId};

use super::{GoodsRepository, RepoError};
use crate::auth::Role;
use crate::model::{
    ClaimOutcome, Company, Good, GoodsQuery, NewGood, PendingStage, StageDraft, StageRecord,
    StageRecords, User,
};

#[derive(Debug, Default)]
struct Inner {
    companies: HashMap<CompanyId, Company>,
    users: HashMap<UserId, User>,
    goods: HashMap<GoodId, Good>,
    stages: HashMap<(GoodId, Stage), StageRecord>,
    next_company_id: i64,
    next_user_id: i64,
    next_good_id: i64,
    next_stage_id: i64,
}

impl Inner {
    fn new_record(&mut self, draft: &StageDraft, now: DateTime<Utc>) -> StageRecord {
        self.next_stage_id += 1;
        StageRecord {
            id: self.next_stage_id,
            good_id: draft.good_id.clone(),
            company_id: draft.actor.company_id,
            operator_id: draft.actor.operator_id,
            operator_name: draft.actor.operator_name.clone(),
            chain_status: ChainStatus::Submitting,
            chain_attempts: 0,
            last_chain_error: None,
            blockchain_tx_hash: String::new(),
            created_at: now,
            updated_at: now,
            payload: draft.payload.clone(),
        }
    }

    fn record_mut(
        &mut self,
        good_id: &GoodId,
        stage: Stage,
    ) -> Result<&mut StageRecord, RepoError> {
        self.stages
            .get_mut(&(good_id.clone(), stage))
            .ok_or_else(|| RepoError::stage_not_found(good_id, stage))
    }
}

/// Whether a record may be (re)claimed for submission.
fn claimable(record: &StageRecord, lease_cutoff: DateTime<Utc>) -> bool {
    match record.chain_status {
        ChainStatus::Pending | ChainStatus::Failed => true,
        ChainStatus::Submitting => record.updated_at < lease_cutoff,
        ChainStatus::Confirmed => false,
    }
}

/// In-memory repository.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a company. Companies are administered outside this service;
    /// this seeds them for development and tests.
    pub fn insert_company(
        &self,
        name: &str,
        company_type: CompanyType,
        blockchain_address: &str,
    ) -> Company {
        let mut inner = self.inner.write();
        inner.next_company_id += 1;
        let company = Company {
            id: CompanyId(inner.next_company_id),
            name: name.to_string(),
            company_type,
            contact_person: String::new(),
            contact_phone: String::new(),
            blockchain_address: blockchain_address.to_string(),
        };
        inner.companies.insert(company.id, company.clone());
        company
    }

    /// Add a user. See [`MemoryRepository::insert_company`].
    pub fn insert_user(
        &self,
        username: &str,
        real_name: &str,
        role: Role,
        company_id: Option<CompanyId>,
    ) -> User {
        let mut inner = self.inner.write();
        inner.next_user_id += 1;
        let user = User {
            id: UserId(inner.next_user_id),
            username: username.to_string(),
            real_name: real_name.to_string(),
            role,
            company_id,
        };
        inner.users.insert(user.id, user.clone());
        user
    }

    /// Move a stage record's last update back in time, as if its claim
    /// had been taken at `at`.
    pub fn backdate_stage(&self, good_id: &GoodId, stage: Stage, at: DateTime<Utc>) -> bool {
        let mut inner = self.inner.write();
        match inner.stages.get_mut(&(good_id.clone(), stage)) {
            Some(record) => {
                record.updated_at = at;
                true
            }
            None => false,
        }
    }

    /// Number of stage records held, across all goods.
    pub fn stage_count(&self) -> usize {
        self.inner.read().stages.len()
    }
}

#[async_trait]
impl GoodsRepository for MemoryRepository {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, RepoError> {
        Ok(self.inner.read().companies.get(&id).cloned())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        Ok(self.inner.read().users.get(&id).cloned())
    }

    async fn good(&self, good_id: &GoodId) -> Result<Option<Good>, RepoError> {
        Ok(self.inner.read().goods.get(good_id).cloned())
    }

    async fn list_goods(&self, query: &GoodsQuery) -> Result<(i64, Vec<Good>), RepoError> {
        let inner = self.inner.read();
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matching: Vec<&Good> = inner
            .goods
            .values()
            .filter(|g| query.owner_company_id.map_or(true, |c| g.owner_company_id == c))
            .filter(|g| query.status.map_or(true, |s| g.status == s))
            .filter(|g| {
                needle.as_deref().map_or(true, |n| {
                    [
                        g.good_id.as_str(),
                        g.good_name.as_str(),
                        g.batch_number.as_str(),
                        g.description.as_str(),
                    ]
                    .iter()
                    .any(|field| field.to_lowercase().contains(n))
                })
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((total, page))
    }

    async fn create_good(
        &self,
        good: NewGood,
        production: StageDraft,
    ) -> Result<(Good, StageRecord), RepoError> {
        let mut inner = self.inner.write();
        if inner.goods.contains_key(&good.good_id) {
            return Err(RepoError::DuplicateGoodId(good.good_id.to_string()));
        }
        let now = Utc::now();
        inner.next_good_id += 1;
        let good = Good {
            id: inner.next_good_id,
            good_id: good.good_id,
            good_name: good.good_name,
            batch_number: good.batch_number,
            description: good.description,
            owner_company_id: good.owner_company_id,
            status: GoodStatus::Produced,
            blockchain_tx_hash: String::new(),
            created_at: now,
            updated_at: now,
        };
        let record = inner.new_record(&production, now);
        inner.goods.insert(good.good_id.clone(), good.clone());
        inner
            .stages
            .insert((good.good_id.clone(), Stage::Production), record.clone());
        Ok((good, record))
    }

    async fn stage_records(&self, good_id: &GoodId) -> Result<StageRecords, RepoError> {
        let inner = self.inner.read();
        let mut records = StageRecords::default();
        for stage in Stage::ALL {
            if let Some(record) = inner.stages.get(&(good_id.clone(), stage)) {
                records.insert(record.clone());
            }
        }
        Ok(records)
    }

    async fn claim_stage(
        &self,
        draft: &StageDraft,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError> {
        let mut inner = self.inner.write();
        if !inner.goods.contains_key(&draft.good_id) {
            return Err(RepoError::NotFound(format!("good {}", draft.good_id)));
        }
        let now = Utc::now();
        let key = (draft.good_id.clone(), draft.payload.stage());

        match inner.stages.get(&key) {
            None => {
                let record = inner.new_record(draft, now);
                inner.stages.insert(key, record.clone());
                Ok(ClaimOutcome::Claimed(record))
            }
            Some(existing) if existing.is_confirmed() => {
                Ok(ClaimOutcome::AlreadyConfirmed(existing.clone()))
            }
            Some(existing) if claimable(existing, lease_cutoff) => {
                let mut record = existing.clone();
                record.company_id = draft.actor.company_id;
                record.operator_id = draft.actor.operator_id;
                record.operator_name = draft.actor.operator_name.clone();
                record.payload = draft.payload.clone();
                record.chain_status = ChainStatus::Submitting;
                record.updated_at = now;
                inner.stages.insert(key, record.clone());
                Ok(ClaimOutcome::Claimed(record))
            }
            Some(_) => Ok(ClaimOutcome::InFlight),
        }
    }

    async fn reclaim_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError> {
        let mut inner = self.inner.write();
        let record = inner.record_mut(good_id, stage)?;
        if record.is_confirmed() {
            return Ok(ClaimOutcome::AlreadyConfirmed(record.clone()));
        }
        if !claimable(record, lease_cutoff) {
            return Ok(ClaimOutcome::InFlight);
        }
        record.chain_status = ChainStatus::Submitting;
        record.updated_at = Utc::now();
        Ok(ClaimOutcome::Claimed(record.clone()))
    }

    async fn confirm_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        tx_hash: &str,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.write();
        let record = inner.record_mut(good_id, stage)?;
        record.chain_status = ChainStatus::Confirmed;
        record.blockchain_tx_hash = tx_hash.to_string();
        record.last_chain_error = None;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn release_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.write();
        let record = inner.record_mut(good_id, stage)?;
        if record.is_confirmed() {
            return Ok(());
        }
        record.chain_status = ChainStatus::Pending;
        record.chain_attempts += 1;
        record.last_chain_error = Some(error.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_stage_failed(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError> {
        let mut inner = self.inner.write();
        let record = inner.record_mut(good_id, stage)?;
        if record.is_confirmed() {
            return Ok(());
        }
        record.chain_status = ChainStatus::Failed;
        record.last_chain_error = Some(error.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn advance_status(
        &self,
        good_id: &GoodId,
        from: GoodStatus,
        to: GoodStatus,
        tx_hash: &str,
    ) -> Result<bool, RepoError> {
        let mut inner = self.inner.write();
        match inner.goods.get_mut(good_id) {
            Some(good) if good.status == from => {
                good.status = to;
                good.blockchain_tx_hash = tx_hash.to_string();
                good.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_unconfirmed(
        &self,
        lease_cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingStage>, RepoError> {
        let inner = self.inner.read();
        let mut due: Vec<&StageRecord> = inner
            .stages
            .values()
            .filter(|r| match r.chain_status {
                ChainStatus::Pending => true,
                ChainStatus::Submitting => r.updated_at < lease_cutoff,
                ChainStatus::Confirmed | ChainStatus::Failed => false,
            })
            .collect();
        due.sort_by_key(|r| (r.updated_at, r.id));
        Ok(due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|r| PendingStage {
                good_id: r.good_id.clone(),
                stage: r.stage(),
                company_id: r.company_id,
                chain_status: r.chain_status,
                chain_attempts: r.chain_attempts,
            })
            .collect())
    }
}
