//! Response views shared by the lifecycle, list and trace endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use seatrace_core::CompanyId;

use crate::model::Good;
use crate::repository::GoodsRepository;

/// Basic information about a good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GoodSummary {
    pub id: i64,
    pub good_id: String,
    pub good_name: String,
    pub batch_number: String,
    pub owner_company_id: i64,
    /// Owning company's name; empty when it cannot be looked up.
    pub owner_company: String,
    pub description: String,
    /// Status code, 1 (produced) to 4 (delivered).
    pub status: u8,
    pub status_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Hash of the latest confirmed chain transaction; empty until one exists.
    pub blockchain_tx_hash: String,
}

impl GoodSummary {
    pub fn new(good: &Good, owner_company: String) -> Self {
        Self {
            id: good.id,
            good_id: good.good_id.to_string(),
            good_name: good.good_name.clone(),
            batch_number: good.batch_number.clone(),
            owner_company_id: good.owner_company_id.get(),
            owner_company,
            description: good.description.clone(),
            status: good.status.code(),
            status_text: good.status.status_text().to_string(),
            created_at: good.created_at,
            updated_at: good.updated_at,
            blockchain_tx_hash: good.blockchain_tx_hash.clone(),
        }
    }
}

/// A company's display name, or an empty string when the lookup fails.
///
/// Names only decorate responses, so a failed lookup degrades the view
/// instead of failing the request.
pub async fn company_name(repo: &dyn GoodsRepository, id: CompanyId) -> String {
    match repo.company(id).await {
        Ok(Some(company)) => company.name,
        Ok(None) => {
            tracing::warn!(company_id = id.get(), "company referenced by a good is missing");
            String::new()
        }
        Err(e) => {
            tracing::warn!(company_id = id.get(), error = %e, "company name lookup failed");
            String::new()
        }
    }
}

/// Summarize a good, looking up its owner's name.
pub async fn summarize(repo: &dyn GoodsRepository, good: &Good) -> GoodSummary {
    let owner = company_name(repo, good.owner_company_id).await;
    GoodSummary::new(good, owner)
}
