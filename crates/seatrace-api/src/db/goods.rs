//! Goods persistence operations.
//!
//! Status changes go through [`advance_status`], a compare-and-set on the
//! `status` column; there is no unconditional status update.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use seatrace_core::{CompanyId, GoodId, GoodStatus};

use crate::model::{Good, GoodsQuery, NewGood};
use crate::repository::RepoError;

const GOOD_COLUMNS: &str = "id, good_id, good_name, batch_number, description, owner_company_id,
     status, blockchain_tx_hash, created_at, updated_at";

/// Insert a new good in status `Produced`.
pub async fn insert(conn: &mut PgConnection, good: &NewGood) -> Result<Good, RepoError> {
    let row = sqlx::query_as::<_, GoodRow>(&format!(
        "INSERT INTO goods (good_id, good_name, batch_number, description, owner_company_id, status)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING {GOOD_COLUMNS}"
    ))
    .bind(good.good_id.as_str())
    .bind(&good.good_name)
    .bind(&good.batch_number)
    .bind(&good.description)
    .bind(good.owner_company_id.get())
    .bind(i16::from(GoodStatus::Produced.code()))
    .fetch_one(conn)
    .await?;

    row.into_good()
}

/// Fetch a good by business identifier.
pub async fn get(pool: &PgPool, good_id: &GoodId) -> Result<Option<Good>, RepoError> {
    let row = sqlx::query_as::<_, GoodRow>(&format!(
        "SELECT {GOOD_COLUMNS} FROM goods WHERE good_id = $1"
    ))
    .bind(good_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(GoodRow::into_good).transpose()
}

/// Filter shared by the page and count queries.
///
/// `$1` owner company, `$2` status code, `$3` ILIKE pattern; each is
/// ignored when NULL.
const LIST_FILTER: &str = "($1::BIGINT IS NULL OR owner_company_id = $1)
     AND ($2::SMALLINT IS NULL OR status = $2)
     AND ($3::TEXT IS NULL
          OR good_id ILIKE $3 OR good_name ILIKE $3
          OR batch_number ILIKE $3 OR description ILIKE $3)";

/// One page of goods, newest first, plus the total number of matches.
pub async fn list(pool: &PgPool, query: &GoodsQuery) -> Result<(i64, Vec<Good>), RepoError> {
    let owner = query.owner_company_id.map(|c: CompanyId| c.get());
    let status = query.status.map(|s| i16::from(s.code()));
    let pattern = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM goods WHERE {LIST_FILTER}"))
        .bind(owner)
        .bind(status)
        .bind(pattern.as_deref())
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, GoodRow>(&format!(
        "SELECT {GOOD_COLUMNS} FROM goods WHERE {LIST_FILTER}
         ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(owner)
    .bind(status)
    .bind(pattern.as_deref())
    .bind(query.limit)
    .bind(query.offset)
    .fetch_all(pool)
    .await?;

    let mut goods = Vec::with_capacity(rows.len());
    for row in rows {
        goods.push(row.into_good()?);
    }
    Ok((total, goods))
}

/// Set `status = to` and the latest hash where the good is currently `from`.
pub async fn advance_status(
    pool: &PgPool,
    good_id: &GoodId,
    from: GoodStatus,
    to: GoodStatus,
    tx_hash: &str,
) -> Result<bool, RepoError> {
    let result = sqlx::query(
        "UPDATE goods SET status = $1, blockchain_tx_hash = $2, updated_at = now()
         WHERE good_id = $3 AND status = $4",
    )
    .bind(i16::from(to.code()))
    .bind(tx_hash)
    .bind(good_id.as_str())
    .bind(i16::from(from.code()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Wrap a search term for `ILIKE`, escaping its wildcards.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(sqlx::FromRow)]
struct GoodRow {
    id: i64,
    good_id: String,
    good_name: String,
    batch_number: String,
    description: String,
    owner_company_id: i64,
    status: i16,
    blockchain_tx_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GoodRow {
    fn into_good(self) -> Result<Good, RepoError> {
        let corrupt = |e: seatrace_core::ValidationError| {
            tracing::warn!(row_id = self.id, error = %e, "skipping corrupt goods row");
            RepoError::Corrupt(e.to_string())
        };
        let good_id = GoodId::new(self.good_id.clone()).map_err(corrupt)?;
        let status = GoodStatus::from_code(i64::from(self.status)).map_err(corrupt)?;
        Ok(Good {
            id: self.id,
            good_id,
            good_name: self.good_name,
            batch_number: self.batch_number,
            description: self.description,
            owner_company_id: CompanyId(self.owner_company_id),
            status,
            blockchain_tx_hash: self.blockchain_tx_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
