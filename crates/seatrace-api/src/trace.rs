//! # Trace Assembler
//!
//! Joins a good, its stage records and (optionally) the chain's own
//! record of the good into one read-only view. Used by the public trace
//! endpoint, so nothing here writes.
//!
//! The chain-side trace is a cross-check shown next to the stored data,
//! never merged into it. When the chain query fails or times out the
//! view is returned without it.
//!
//! Public traces carry each stage's chain status and attempt count but not
//! the stored failure text, which names gateway endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use seatrace_chain_client::{ChainGateway, ChainTrace};
use seatrace_core::{CompanyId, GoodId, Stage};

use crate::lifecycle::EngineError;
use crate::model::{StagePayload, StageRecord};
use crate::repository::GoodsRepository;
use crate::views::{company_name, summarize, GoodSummary};

/// One stage of the trace: who performed it, its chain state, and the
/// stage-specific fields flattened alongside.
#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub company_id: i64,
    pub company_name: String,
    pub operator_name: String,
    /// `pending`, `submitting`, `confirmed` or `failed`.
    pub chain_status: String,
    /// Empty until the chain confirms the stage.
    pub blockchain_hash: String,
    pub chain_attempts: i32,
    /// Only present for [`TraceAudience::Member`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chain_error: Option<String>,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: StagePayload,
}

/// Full trace of a good.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TraceView {
    pub basic: GoodSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub production: Option<StageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub transport: Option<StageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub inspection: Option<StageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub delivery: Option<StageView>,
    /// The contract's record of the good, when the chain could be queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub blockchain: Option<ChainTrace>,
}

impl TraceView {
    pub fn stage(&self, stage: Stage) -> Option<&StageView> {
        match stage {
            Stage::Production => self.production.as_ref(),
            Stage::Transport => self.transport.as_ref(),
            Stage::Inspection => self.inspection.as_ref(),
            Stage::Delivery => self.delivery.as_ref(),
        }
    }
}

/// Who a trace is assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAudience {
    /// Unauthenticated holder of a good id.
    Public,
    /// Authenticated caller; sees chain failure details.
    Member,
}

/// Builds [`TraceView`]s.
#[derive(Clone)]
pub struct TraceAssembler {
    repo: Arc<dyn GoodsRepository>,
    gateway: Arc<dyn ChainGateway>,
    chain_trace_enabled: bool,
    chain_timeout: Duration,
}

impl std::fmt::Debug for TraceAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceAssembler")
            .field("chain_trace_enabled", &self.chain_trace_enabled)
            .field("chain_timeout", &self.chain_timeout)
            .finish_non_exhaustive()
    }
}

impl TraceAssembler {
    pub fn new(
        repo: Arc<dyn GoodsRepository>,
        gateway: Arc<dyn ChainGateway>,
        chain_trace_enabled: bool,
        chain_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            gateway,
            chain_trace_enabled,
            chain_timeout,
        }
    }

    /// Assemble the trace of `raw_good_id`.
    pub async fn trace(
        &self,
        raw_good_id: &str,
        audience: TraceAudience,
    ) -> Result<TraceView, EngineError> {
        let good_id = GoodId::new(raw_good_id.trim())
            .map_err(|e| EngineError::Validation(e.to_string()))?;
        let good = self
            .repo
            .good(&good_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("good {good_id}")))?;
        let records = self.repo.stage_records(&good_id).await?;

        let basic = summarize(self.repo.as_ref(), &good).await;
        let mut names = HashMap::from([(good.owner_company_id, basic.owner_company.clone())]);

        let mut view = TraceView {
            basic,
            production: None,
            transport: None,
            inspection: None,
            delivery: None,
            blockchain: None,
        };
        for record in [records.production, records.transport, records.inspection, records.delivery]
            .into_iter()
            .flatten()
        {
            let stage = record.stage();
            let stage_view = self.stage_view(record, audience, &mut names).await;
            match stage {
                Stage::Production => view.production = Some(stage_view),
                Stage::Transport => view.transport = Some(stage_view),
                Stage::Inspection => view.inspection = Some(stage_view),
                Stage::Delivery => view.delivery = Some(stage_view),
            }
        }

        if self.chain_trace_enabled {
            view.blockchain = self.chain_trace(&good_id).await;
        }
        Ok(view)
    }

    async fn stage_view(
        &self,
        record: StageRecord,
        audience: TraceAudience,
        names: &mut HashMap<CompanyId, String>,
    ) -> StageView {
        let company_name = match names.get(&record.company_id) {
            Some(name) => name.clone(),
            None => {
                let name = company_name(self.repo.as_ref(), record.company_id).await;
                names.insert(record.company_id, name.clone());
                name
            }
        };
        StageView {
            company_id: record.company_id.get(),
            company_name,
            operator_name: record.operator_name,
            chain_status: record.chain_status.as_str().to_string(),
            blockchain_hash: record.blockchain_tx_hash,
            chain_attempts: record.chain_attempts,
            last_chain_error: match audience {
                TraceAudience::Member => record.last_chain_error,
                TraceAudience::Public => None,
            },
            recorded_at: record.created_at,
            details: record.payload,
        }
    }

    async fn chain_trace(&self, good_id: &GoodId) -> Option<ChainTrace> {
        match tokio::time::timeout(self.chain_timeout, self.gateway.full_trace(good_id)).await {
            Ok(Ok(trace)) => Some(trace),
            Ok(Err(e)) => {
                tracing::warn!(good_id = %good_id, error = %e, "chain-side trace unavailable");
                None
            }
            Err(_) => {
                tracing::warn!(good_id = %good_id, "chain-side trace timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use seatrace_chain_client::{ChainError, ContractCall, TxReceipt};
    use seatrace_core::{CompanyType, GoodStatus, UserId};

    use crate::model::{NewGood, ProductionData, StageActor, StageDraft};
    use crate::repository::MemoryRepository;

    struct StaticGateway {
        trace: Option<ChainTrace>,
    }

    #[async_trait]
    impl ChainGateway for StaticGateway {
        async fn invoke(&self, _call: &ContractCall) -> Result<TxReceipt, ChainError> {
            unreachable!("trace assembly never writes")
        }

        async fn full_trace(&self, good_id: &GoodId) -> Result<ChainTrace, ChainError> {
            self.trace.clone().ok_or_else(|| ChainError::Decode {
                endpoint: "getFullTrace".to_string(),
                detail: format!("{good_id} unknown to contract"),
            })
        }

        async fn good_status(&self, _good_id: &GoodId) -> Result<GoodStatus, ChainError> {
            Ok(GoodStatus::Produced)
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            Ok(0)
        }

        async fn transaction(&self, _hash: &str) -> Result<serde_json::Value, ChainError> {
            Ok(serde_json::Value::Null)
        }
    }

    /// A gateway whose contract reads never answer.
    struct StalledGateway;

    #[async_trait]
    impl ChainGateway for StalledGateway {
        async fn invoke(&self, _call: &ContractCall) -> Result<TxReceipt, ChainError> {
            unreachable!("trace assembly never writes")
        }

        async fn full_trace(&self, _good_id: &GoodId) -> Result<ChainTrace, ChainError> {
            std::future::pending().await
        }

        async fn good_status(&self, _good_id: &GoodId) -> Result<GoodStatus, ChainError> {
            std::future::pending().await
        }

        async fn block_number(&self) -> Result<u64, ChainError> {
            std::future::pending().await
        }

        async fn transaction(&self, _hash: &str) -> Result<serde_json::Value, ChainError> {
            std::future::pending().await
        }
    }

    fn chain_trace(good_id: &GoodId) -> ChainTrace {
        ChainTrace {
            good_id: good_id.to_string(),
            owner_company_id: "1".to_string(),
            good_name: "Hairtail".to_string(),
            register_time: None,
            shipment: None,
            inspection: None,
            delivery: None,
            completed_stages: 1,
        }
    }

    async fn seeded() -> (Arc<MemoryRepository>, GoodId) {
        let repo = Arc::new(MemoryRepository::new());
        let company = repo.insert_company(
            "Harbor Fisheries",
            CompanyType::Producer,
            "0x1111111111111111111111111111111111111111",
        );
        let good_id = GoodId::new("G1202405010000abcd").unwrap();
        repo.create_good(
            NewGood {
                good_id: good_id.clone(),
                good_name: "Hairtail".to_string(),
                batch_number: "HT-1".to_string(),
                description: String::new(),
                owner_company_id: company.id,
            },
            StageDraft {
                good_id: good_id.clone(),
                actor: StageActor {
                    company_id: company.id,
                    operator_id: UserId(1),
                    operator_name: "Alice".to_string(),
                },
                payload: StagePayload::Production(ProductionData {
                    location: "Zhoushan".to_string(),
                    produced_at: Utc::now(),
                    batch_info: "night catch".to_string(),
                    quality_level: "A".to_string(),
                    expiry_date: None,
                }),
            },
        )
        .await
        .unwrap();
        (repo, good_id)
    }

    #[tokio::test]
    async fn trace_of_fresh_good_has_only_production() {
        let (repo, good_id) = seeded().await;
        let gateway = Arc::new(StaticGateway {
            trace: Some(chain_trace(&good_id)),
        });
        let assembler = TraceAssembler::new(repo, gateway, true, Duration::from_secs(1));

        let view = assembler
            .trace(good_id.as_str(), TraceAudience::Public)
            .await
            .unwrap();
        assert_eq!(view.basic.status_text, "Produced");
        assert_eq!(view.basic.owner_company, "Harbor Fisheries");

        let production = view.production.as_ref().unwrap();
        assert_eq!(production.company_name, "Harbor Fisheries");
        assert_eq!(production.chain_status, "submitting");
        match &production.details {
            StagePayload::Production(d) => {
                assert_eq!(d.location, "Zhoushan");
                assert_eq!(d.batch_info, "night catch");
                assert_eq!(d.quality_level, "A");
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert!(view.transport.is_none());
        assert!(view.inspection.is_none());
        assert!(view.delivery.is_none());
        assert_eq!(view.blockchain.unwrap().good_name, "Hairtail");
    }

    #[tokio::test]
    async fn chain_failure_degrades_to_stored_trace() {
        let (repo, good_id) = seeded().await;
        let assembler = TraceAssembler::new(
            repo,
            Arc::new(StaticGateway { trace: None }),
            true,
            Duration::from_secs(1),
        );
        let view = assembler
            .trace(good_id.as_str(), TraceAudience::Public)
            .await
            .unwrap();
        assert!(view.production.is_some());
        assert!(view.blockchain.is_none());
    }

    #[tokio::test]
    async fn stalled_chain_times_out_to_stored_trace() {
        let (repo, good_id) = seeded().await;
        let assembler = TraceAssembler::new(
            repo,
            Arc::new(StalledGateway),
            true,
            Duration::from_millis(50),
        );
        let view = tokio::time::timeout(
            Duration::from_secs(5),
            assembler.trace(good_id.as_str(), TraceAudience::Public),
        )
        .await
        .expect("trace must not wait on the chain past its timeout")
        .unwrap();
        assert_eq!(view.production.unwrap().details.stage(), Stage::Production);
        assert!(view.blockchain.is_none());
    }

    #[tokio::test]
    async fn failure_text_is_only_shown_to_members() {
        let (repo, good_id) = seeded().await;
        let failure = "HTTP error calling POST /trans/handle registerGood: \
                       error sending request for url (http://10.0.0.7:5002/WeBASE-Front/trans/handle)";
        repo.release_stage(&good_id, Stage::Production, failure)
            .await
            .unwrap();
        let assembler = TraceAssembler::new(
            repo,
            Arc::new(StaticGateway { trace: None }),
            true,
            Duration::from_secs(1),
        );

        let public = assembler
            .trace(good_id.as_str(), TraceAudience::Public)
            .await
            .unwrap();
        let production = public.production.as_ref().unwrap();
        assert_eq!(production.chain_status, "pending");
        assert_eq!(production.chain_attempts, 1);
        assert!(production.last_chain_error.is_none());
        assert!(!serde_json::to_string(&public).unwrap().contains("10.0.0.7"));

        let member = assembler
            .trace(good_id.as_str(), TraceAudience::Member)
            .await
            .unwrap();
        assert_eq!(
            member.production.unwrap().last_chain_error.as_deref(),
            Some(failure)
        );
    }

    #[tokio::test]
    async fn chain_trace_can_be_disabled() {
        let (repo, good_id) = seeded().await;
        let gateway = Arc::new(StaticGateway {
            trace: Some(chain_trace(&good_id)),
        });
        let assembler = TraceAssembler::new(repo, gateway, false, Duration::from_secs(1));
        let view = assembler
            .trace(good_id.as_str(), TraceAudience::Public)
            .await
            .unwrap();
        assert!(view.blockchain.is_none());
    }

    #[tokio::test]
    async fn unknown_good_is_not_found() {
        let (repo, _) = seeded().await;
        let assembler = TraceAssembler::new(
            repo,
            Arc::new(StaticGateway { trace: None }),
            true,
            Duration::from_secs(1),
        );
        let err = assembler
            .trace("G9202401019999zzzz", TraceAudience::Public)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn stage_view_flattens_payload_fields() {
        let view = StageView {
            company_id: 2,
            company_name: "Blue Freight".to_string(),
            operator_name: "Bob".to_string(),
            chain_status: "confirmed".to_string(),
            blockchain_hash: "0xabc".to_string(),
            chain_attempts: 1,
            last_chain_error: None,
            recorded_at: Utc::now(),
            details: StagePayload::Production(ProductionData {
                location: "Xiamen Factory".to_string(),
                produced_at: Utc::now(),
                batch_info: String::new(),
                quality_level: String::new(),
                expiry_date: None,
            }),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["location"], "Xiamen Factory");
        assert_eq!(json["stage"], "production");
        assert_eq!(json["blockchain_hash"], "0xabc");
        assert!(json.get("last_chain_error").is_none());
    }
}
