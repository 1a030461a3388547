//! Stage record persistence: the four `*_records` tables.
//!
//! The tables share their bookkeeping columns and differ in payload
//! columns, so SQL is assembled from [`StageTable`] descriptors. Every
//! fragment is a static string; values are always bound.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{FromRow, PgConnection, PgPool, Postgres};

use seatrace_core::{ChainStatus, CompanyId, GoodId, Stage, UserId};

use crate::model::{
    DeliveryData, InspectionData, PendingStage, ProductionData, StageDraft, StagePayload,
    StageRecord, StageRecords, TransportData,
};
use crate::repository::RepoError;

struct StageTable {
    name: &'static str,
    payload_columns: &'static [&'static str],
}

static PRODUCTION: StageTable = StageTable {
    name: "production_records",
    payload_columns: &["location", "produced_at", "batch_info", "quality_level", "expiry_date"],
};

static TRANSPORT: StageTable = StageTable {
    name: "transport_records",
    payload_columns: &[
        "start_location",
        "end_location",
        "transport_info",
        "start_time",
        "end_time",
        "actual_arrival_time",
        "tracking_number",
    ],
};

static INSPECTION: StageTable = StageTable {
    name: "inspection_records",
    payload_columns: &[
        "inspection_info",
        "quality_score",
        "pass_status",
        "inspection_time",
        "location",
        "notes",
    ],
};

static DELIVERY: StageTable = StageTable {
    name: "delivery_records",
    payload_columns: &[
        "delivery_info",
        "recipient_name",
        "recipient_contact",
        "delivery_time",
        "location",
        "notes",
    ],
};

const COMMON_COLUMNS: &str = "id, good_id, company_id, operator_id, operator_name, chain_status,
     chain_attempts, last_chain_error, blockchain_tx_hash, created_at, updated_at";

/// Rows in these states may be claimed; `$lease` is the cutoff parameter.
const CLAIMABLE: &str = "(chain_status IN ('pending', 'failed')
     OR (chain_status = 'submitting' AND updated_at < $lease))";

fn table(stage: Stage) -> &'static StageTable {
    match stage {
        Stage::Production => &PRODUCTION,
        Stage::Transport => &TRANSPORT,
        Stage::Inspection => &INSPECTION,
        Stage::Delivery => &DELIVERY,
    }
}

impl StageTable {
    fn select_columns(&self) -> String {
        format!("{COMMON_COLUMNS}, {}", self.payload_columns.join(", "))
    }

    /// Claim-by-upsert. Parameters: `$1` good id, `$2` company, `$3`
    /// operator, `$4` operator name, `$5` lease cutoff, `$6..` payload.
    fn claim_sql(&self) -> String {
        let columns = self.payload_columns.join(", ");
        let params = (0..self.payload_columns.len())
            .map(|i| format!("${}", i + 6))
            .collect::<Vec<_>>()
            .join(", ");
        let updates = self
            .payload_columns
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let claimable = CLAIMABLE
            .replace("chain_status", "t.chain_status")
            .replace("updated_at", "t.updated_at")
            .replace("$lease", "$5");
        format!(
            "INSERT INTO {table} AS t (goods_id, good_id, company_id, operator_id, operator_name,
                 {columns}, chain_status)
             SELECT g.id, g.good_id, $2, $3, $4, {params}, 'submitting'
             FROM goods g WHERE g.good_id = $1
             ON CONFLICT (good_id) DO UPDATE SET
                 company_id = EXCLUDED.company_id,
                 operator_id = EXCLUDED.operator_id,
                 operator_name = EXCLUDED.operator_name,
                 {updates},
                 chain_status = 'submitting',
                 updated_at = now()
             WHERE {claimable}
             RETURNING {returning}",
            table = self.name,
            returning = self.select_columns(),
        )
    }
}

// ── Writes ──────────────────────────────────────────────────────────

/// Bind a payload's values in `payload_columns` order.
fn bind_payload<'q>(
    query: Query<'q, Postgres, PgArguments>,
    payload: &'q StagePayload,
) -> Query<'q, Postgres, PgArguments> {
    match payload {
        StagePayload::Production(p) => query
            .bind(&p.location)
            .bind(p.produced_at)
            .bind(&p.batch_info)
            .bind(&p.quality_level)
            .bind(p.expiry_date),
        StagePayload::Transport(p) => query
            .bind(&p.start_location)
            .bind(&p.end_location)
            .bind(&p.transport_info)
            .bind(p.start_time)
            .bind(p.end_time)
            .bind(p.actual_arrival_time)
            .bind(&p.tracking_number),
        StagePayload::Inspection(p) => query
            .bind(&p.inspection_info)
            .bind(p.quality_score)
            .bind(p.pass_status)
            .bind(p.inspection_time)
            .bind(&p.location)
            .bind(&p.notes),
        StagePayload::Delivery(p) => query
            .bind(&p.delivery_info)
            .bind(&p.recipient_name)
            .bind(&p.recipient_contact)
            .bind(p.delivery_time)
            .bind(&p.location)
            .bind(&p.notes),
    }
}

/// Write or reclaim the record for `draft`, marking it `submitting`.
///
/// Returns `None` when nothing was written: the good does not exist, the
/// record is already confirmed, or another claim is still live.
pub async fn claim(
    conn: &mut PgConnection,
    draft: &StageDraft,
    lease_cutoff: DateTime<Utc>,
) -> Result<Option<StageRecord>, RepoError> {
    let stage = draft.payload.stage();
    let sql = table(stage).claim_sql();
    let query = sqlx::query(&sql)
        .bind(draft.good_id.as_str())
        .bind(draft.actor.company_id.get())
        .bind(draft.actor.operator_id.get())
        .bind(&draft.actor.operator_name)
        .bind(lease_cutoff);
    let row = bind_payload(query, &draft.payload)
        .fetch_optional(conn)
        .await?;

    row.map(|r| decode(stage, &r)).transpose()
}

/// Reclaim an existing record without touching its payload.
pub async fn reclaim(
    pool: &PgPool,
    good_id: &GoodId,
    stage: Stage,
    lease_cutoff: DateTime<Utc>,
) -> Result<Option<StageRecord>, RepoError> {
    let t = table(stage);
    let sql = format!(
        "UPDATE {} SET chain_status = 'submitting', updated_at = now()
         WHERE good_id = $1 AND {}
         RETURNING {}",
        t.name,
        CLAIMABLE.replace("$lease", "$2"),
        t.select_columns(),
    );
    let row = sqlx::query(&sql)
        .bind(good_id.as_str())
        .bind(lease_cutoff)
        .fetch_optional(pool)
        .await?;

    row.map(|r| decode(stage, &r)).transpose()
}

/// Record chain confirmation. Returns whether the record exists.
pub async fn confirm(
    pool: &PgPool,
    good_id: &GoodId,
    stage: Stage,
    tx_hash: &str,
) -> Result<bool, RepoError> {
    let sql = format!(
        "UPDATE {} SET chain_status = 'confirmed', blockchain_tx_hash = $2,
             last_chain_error = NULL, updated_at = now()
         WHERE good_id = $1",
        table(stage).name
    );
    let result = sqlx::query(&sql)
        .bind(good_id.as_str())
        .bind(tx_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Move an unconfirmed record to `status`, recording `error`.
/// `count_attempt` increments `chain_attempts`.
pub async fn set_unconfirmed(
    pool: &PgPool,
    good_id: &GoodId,
    stage: Stage,
    status: ChainStatus,
    error: &str,
    count_attempt: bool,
) -> Result<(), RepoError> {
    let sql = format!(
        "UPDATE {} SET chain_status = $2, last_chain_error = $3,
             chain_attempts = chain_attempts + $4, updated_at = now()
         WHERE good_id = $1 AND chain_status <> 'confirmed'",
        table(stage).name
    );
    sqlx::query(&sql)
        .bind(good_id.as_str())
        .bind(status.as_str())
        .bind(error)
        .bind(i32::from(count_attempt))
        .execute(pool)
        .await?;
    Ok(())
}

// ── Reads ───────────────────────────────────────────────────────────

/// Fetch the record of one stage.
pub async fn get(
    pool: &PgPool,
    good_id: &GoodId,
    stage: Stage,
) -> Result<Option<StageRecord>, RepoError> {
    let t = table(stage);
    let sql = format!("SELECT {} FROM {} WHERE good_id = $1", t.select_columns(), t.name);
    let row = sqlx::query(&sql)
        .bind(good_id.as_str())
        .fetch_optional(pool)
        .await?;

    row.map(|r| decode(stage, &r)).transpose()
}

/// Fetch every stage record of a good.
pub async fn get_all(pool: &PgPool, good_id: &GoodId) -> Result<StageRecords, RepoError> {
    let mut records = StageRecords::default();
    for stage in Stage::ALL {
        if let Some(record) = get(pool, good_id, stage).await? {
            records.insert(record);
        }
    }
    Ok(records)
}

/// Records awaiting a chain write across all four tables, oldest first.
pub async fn list_unconfirmed(
    pool: &PgPool,
    lease_cutoff: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<PendingStage>, RepoError> {
    let due = "chain_status = 'pending' OR (chain_status = 'submitting' AND updated_at < $1)";
    let sql = Stage::ALL
        .iter()
        .map(|s| {
            format!(
                "SELECT good_id, '{}' AS stage, company_id, chain_status, chain_attempts, updated_at
                 FROM {} WHERE {due}",
                s.as_str(),
                table(*s).name
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    let rows = sqlx::query_as::<_, PendingRow>(&format!(
        "SELECT * FROM ({sql}) AS due ORDER BY updated_at LIMIT $2"
    ))
    .bind(lease_cutoff)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PendingRow::into_pending).collect()
}

// ── Row decoding ────────────────────────────────────────────────────

fn corrupt(e: impl std::fmt::Display) -> RepoError {
    RepoError::Corrupt(e.to_string())
}

#[derive(FromRow)]
struct CommonRow {
    id: i64,
    good_id: String,
    company_id: i64,
    operator_id: i64,
    operator_name: String,
    chain_status: String,
    chain_attempts: i32,
    last_chain_error: Option<String>,
    blockchain_tx_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommonRow {
    fn into_record(self, payload: StagePayload) -> Result<StageRecord, RepoError> {
        Ok(StageRecord {
            id: self.id,
            good_id: GoodId::new(self.good_id).map_err(corrupt)?,
            company_id: CompanyId(self.company_id),
            operator_id: UserId(self.operator_id),
            operator_name: self.operator_name,
            chain_status: self.chain_status.parse().map_err(corrupt)?,
            chain_attempts: self.chain_attempts,
            last_chain_error: self.last_chain_error,
            blockchain_tx_hash: self.blockchain_tx_hash,
            created_at: self.created_at,
            updated_at: self.updated_at,
            payload,
        })
    }
}

#[derive(FromRow)]
struct ProductionRow {
    #[sqlx(flatten)]
    common: CommonRow,
    location: String,
    produced_at: DateTime<Utc>,
    batch_info: String,
    quality_level: String,
    expiry_date: Option<DateTime<Utc>>,
}

#[derive(FromRow)]
struct TransportRow {
    #[sqlx(flatten)]
    common: CommonRow,
    start_location: String,
    end_location: String,
    transport_info: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    actual_arrival_time: Option<DateTime<Utc>>,
    tracking_number: String,
}

#[derive(FromRow)]
struct InspectionRow {
    #[sqlx(flatten)]
    common: CommonRow,
    inspection_info: String,
    quality_score: i32,
    pass_status: bool,
    inspection_time: DateTime<Utc>,
    location: String,
    notes: String,
}

#[derive(FromRow)]
struct DeliveryRow {
    #[sqlx(flatten)]
    common: CommonRow,
    delivery_info: String,
    recipient_name: String,
    recipient_contact: String,
    delivery_time: DateTime<Utc>,
    location: String,
    notes: String,
}

fn decode(stage: Stage, row: &PgRow) -> Result<StageRecord, RepoError> {
    match stage {
        Stage::Production => {
            let r = ProductionRow::from_row(row)?;
            r.common.into_record(StagePayload::Production(ProductionData {
                location: r.location,
                produced_at: r.produced_at,
                batch_info: r.batch_info,
                quality_level: r.quality_level,
                expiry_date: r.expiry_date,
            }))
        }
        Stage::Transport => {
            let r = TransportRow::from_row(row)?;
            r.common.into_record(StagePayload::Transport(TransportData {
                start_location: r.start_location,
                end_location: r.end_location,
                transport_info: r.transport_info,
                start_time: r.start_time,
                end_time: r.end_time,
                actual_arrival_time: r.actual_arrival_time,
                tracking_number: r.tracking_number,
            }))
        }
        Stage::Inspection => {
            let r = InspectionRow::from_row(row)?;
            r.common.into_record(StagePayload::Inspection(InspectionData {
                inspection_info: r.inspection_info,
                quality_score: r.quality_score,
                pass_status: r.pass_status,
                inspection_time: r.inspection_time,
                location: r.location,
                notes: r.notes,
            }))
        }
        Stage::Delivery => {
            let r = DeliveryRow::from_row(row)?;
            r.common.into_record(StagePayload::Delivery(DeliveryData {
                delivery_info: r.delivery_info,
                recipient_name: r.recipient_name,
                recipient_contact: r.recipient_contact,
                delivery_time: r.delivery_time,
                location: r.location,
                notes: r.notes,
            }))
        }
    }
}

#[derive(FromRow)]
struct PendingRow {
    good_id: String,
    stage: String,
    company_id: i64,
    chain_status: String,
    chain_attempts: i32,
}

impl PendingRow {
    fn into_pending(self) -> Result<PendingStage, RepoError> {
        Ok(PendingStage {
            good_id: GoodId::new(self.good_id).map_err(corrupt)?,
            stage: self.stage.parse().map_err(corrupt)?,
            company_id: CompanyId(self.company_id),
            chain_status: self.chain_status.parse().map_err(corrupt)?,
            chain_attempts: self.chain_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_sql_binds_payload_after_lease() {
        let sql = TRANSPORT.claim_sql();
        assert!(sql.contains("SELECT g.id, g.good_id, $2, $3, $4, $6, $7, $8, $9, $10, $11, $12"));
        assert!(sql.contains("t.updated_at < $5"));
        assert!(sql.contains("tracking_number = EXCLUDED.tracking_number"));
        assert!(!sql.contains("$lease"));
    }

    #[test]
    fn claim_sql_guards_confirmed_rows() {
        let sql = PRODUCTION.claim_sql();
        assert!(sql.contains("t.chain_status IN ('pending', 'failed')"));
        assert!(sql.contains("t.chain_status = 'submitting'"));
    }

    #[test]
    fn every_stage_has_a_table() {
        let names: Vec<_> = Stage::ALL.iter().map(|s| table(*s).name).collect();
        assert_eq!(
            names,
            [
                "production_records",
                "transport_records",
                "inspection_records",
                "delivery_records"
            ]
        );
    }
}
