//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx.
//!
//! The database is **optional**. When `DATABASE_URL` is set the service
//! persists companies, users, goods and stage records to Postgres through
//! [`PgRepository`]. When absent it runs on the in-memory repository,
//! which is suitable for development and tests only.
//!
//! Migrations are embedded and applied on startup.

pub mod companies;
pub mod goods;
pub mod stages;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};

use seatrace_core::{ChainStatus, CompanyId, GoodId, GoodStatus, Stage, UserId};

use crate::model::{
    ClaimOutcome, Company, Good, GoodsQuery, NewGood, PendingStage, StageDraft, StageRecord,
    StageRecords, User,
};
use crate::repository::{GoodsRepository, RepoError};

/// Initialize the connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory mode).
/// Returns `Err` if the URL is set but connecting or migrating fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.trim().is_empty() => url,
        _ => {
            tracing::warn!(
                "DATABASE_URL not set, running with the in-memory repository. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// [`GoodsRepository`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn a unique violation on the good id into [`RepoError::DuplicateGoodId`].
fn duplicate_as(err: RepoError, good_id: &GoodId) -> RepoError {
    match err {
        RepoError::Database(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            RepoError::DuplicateGoodId(good_id.to_string())
        }
        other => other,
    }
}

impl PgRepository {
    /// After a claim wrote nothing, tell a confirmed record from a live claim.
    async fn unclaimed_outcome(
        &self,
        good_id: &GoodId,
        stage: Stage,
    ) -> Result<ClaimOutcome, RepoError> {
        match stages::get(&self.pool, good_id, stage).await? {
            Some(record) if record.is_confirmed() => Ok(ClaimOutcome::AlreadyConfirmed(record)),
            Some(_) => Ok(ClaimOutcome::InFlight),
            None => Err(RepoError::NotFound(format!("good {good_id}"))),
        }
    }
}

#[async_trait]
impl GoodsRepository for PgRepository {
    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, RepoError> {
        companies::get_company(&self.pool, id).await
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        companies::get_user(&self.pool, id).await
    }

    async fn good(&self, good_id: &GoodId) -> Result<Option<Good>, RepoError> {
        goods::get(&self.pool, good_id).await
    }

    async fn list_goods(&self, query: &GoodsQuery) -> Result<(i64, Vec<Good>), RepoError> {
        goods::list(&self.pool, query).await
    }

    async fn create_good(
        &self,
        good: NewGood,
        production: StageDraft,
    ) -> Result<(Good, StageRecord), RepoError> {
        let mut tx = self.pool.begin().await?;

        let inserted = goods::insert(&mut *tx, &good)
            .await
            .map_err(|e| duplicate_as(e, &good.good_id))?;
        let record = stages::claim(&mut *tx, &production, Utc::now())
            .await
            .map_err(|e| duplicate_as(e, &good.good_id))?
            .ok_or_else(|| {
                RepoError::Corrupt(format!(
                    "production record of new good {} was not written",
                    good.good_id
                ))
            })?;

        tx.commit().await?;
        Ok((inserted, record))
    }

    async fn stage_records(&self, good_id: &GoodId) -> Result<StageRecords, RepoError> {
        stages::get_all(&self.pool, good_id).await
    }

    async fn claim_stage(
        &self,
        draft: &StageDraft,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError> {
        let mut conn = self.pool.acquire().await?;
        match stages::claim(&mut *conn, draft, lease_cutoff).await? {
            Some(record) => Ok(ClaimOutcome::Claimed(record)),
            None => {
                self.unclaimed_outcome(&draft.good_id, draft.payload.stage())
                    .await
            }
        }
    }

    async fn reclaim_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        lease_cutoff: DateTime<Utc>,
    ) -> Result<ClaimOutcome, RepoError> {
        match stages::reclaim(&self.pool, good_id, stage, lease_cutoff).await? {
            Some(record) => Ok(ClaimOutcome::Claimed(record)),
            None => match stages::get(&self.pool, good_id, stage).await? {
                Some(record) if record.is_confirmed() => {
                    Ok(ClaimOutcome::AlreadyConfirmed(record))
                }
                Some(_) => Ok(ClaimOutcome::InFlight),
                None => Err(RepoError::stage_not_found(good_id, stage)),
            },
        }
    }

    async fn confirm_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        tx_hash: &str,
    ) -> Result<(), RepoError> {
        if stages::confirm(&self.pool, good_id, stage, tx_hash).await? {
            Ok(())
        } else {
            Err(RepoError::stage_not_found(good_id, stage))
        }
    }

    async fn release_stage(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError> {
        stages::set_unconfirmed(&self.pool, good_id, stage, ChainStatus::Pending, error, true).await
    }

    async fn mark_stage_failed(
        &self,
        good_id: &GoodId,
        stage: Stage,
        error: &str,
    ) -> Result<(), RepoError> {
        stages::set_unconfirmed(&self.pool, good_id, stage, ChainStatus::Failed, error, false)
            .await
    }

    async fn advance_status(
        &self,
        good_id: &GoodId,
        from: GoodStatus,
        to: GoodStatus,
        tx_hash: &str,
    ) -> Result<bool, RepoError> {
        goods::advance_status(&self.pool, good_id, from, to, tx_hash).await
    }

    async fn list_unconfirmed(
        &self,
        lease_cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PendingStage>, RepoError> {
        stages::list_unconfirmed(&self.pool, lease_cutoff, limit).await
    }
}
