//! # Lifecycle Commands
//!
//! Request bodies of the four lifecycle operations and of resubmission.
//! They double as the lifecycle engine's inputs, so the same [`Validate`]
//! rules run whether a command arrives over HTTP or from a test.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::extractors::{require_max_len, require_non_empty, Validate};

/// Inclusive bounds of an inspection quality score.
pub const QUALITY_SCORE_RANGE: std::ops::RangeInclusive<i32> = 0..=100;

/// Register a new good (Producer companies).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RegisterGood {
    pub good_name: String,
    #[serde(default)]
    pub batch_number: String,
    #[serde(default)]
    pub description: String,
    /// Production site.
    pub location: String,
    #[serde(default)]
    pub batch_info: String,
    #[serde(default)]
    pub quality_level: String,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    #[serde(default)]
    pub expiry_date: Option<String>,
}

impl RegisterGood {
    /// Parsed expiry date; a bare date means midnight UTC.
    pub fn expiry(&self) -> Result<Option<DateTime<Utc>>, String> {
        match self.expiry_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse_date_or_datetime(raw)
                .map(Some)
                .ok_or_else(|| format!("cannot parse expiry_date {raw:?}, expected RFC 3339 or YYYY-MM-DD")),
        }
    }
}

impl Validate for RegisterGood {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_name", &self.good_name)?;
        require_max_len("good_name", &self.good_name, 128)?;
        require_max_len("batch_number", &self.batch_number, 64)?;
        require_non_empty("location", &self.location)?;
        require_max_len("location", &self.location, 255)?;
        require_max_len("quality_level", &self.quality_level, 32)?;
        self.expiry().map(|_| ())
    }
}

/// Record shipment of a produced good (Shipper companies).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShipGood {
    pub good_id: String,
    pub start_location: String,
    pub end_location: String,
    pub transport_info: String,
    /// Planned arrival.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tracking_number: String,
}

impl Validate for ShipGood {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_id", &self.good_id)?;
        require_non_empty("start_location", &self.start_location)?;
        require_max_len("start_location", &self.start_location, 255)?;
        require_non_empty("end_location", &self.end_location)?;
        require_max_len("end_location", &self.end_location, 255)?;
        require_non_empty("transport_info", &self.transport_info)?;
        require_max_len("tracking_number", &self.tracking_number, 64)
    }
}

/// Record inspection of a shipped good (Port companies).
///
/// A failed inspection is recorded but still advances the good.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InspectGood {
    pub good_id: String,
    pub inspection_info: String,
    /// 0 to 100.
    pub quality_score: i32,
    #[serde(default)]
    pub pass_status: bool,
    pub location: String,
    #[serde(default)]
    pub notes: String,
}

impl Validate for InspectGood {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_id", &self.good_id)?;
        require_non_empty("inspection_info", &self.inspection_info)?;
        if !QUALITY_SCORE_RANGE.contains(&self.quality_score) {
            return Err(format!(
                "quality_score must be between {} and {}, got {}",
                QUALITY_SCORE_RANGE.start(),
                QUALITY_SCORE_RANGE.end(),
                self.quality_score
            ));
        }
        require_non_empty("location", &self.location)?;
        require_max_len("location", &self.location, 255)
    }
}

/// Record delivery of an inspected good (Dealer companies).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeliverGood {
    pub good_id: String,
    pub delivery_info: String,
    pub recipient_name: String,
    pub recipient_contact: String,
    pub location: String,
    #[serde(default)]
    pub notes: String,
}

impl Validate for DeliverGood {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_id", &self.good_id)?;
        require_non_empty("delivery_info", &self.delivery_info)?;
        require_non_empty("recipient_name", &self.recipient_name)?;
        require_max_len("recipient_name", &self.recipient_name, 64)?;
        require_non_empty("recipient_contact", &self.recipient_contact)?;
        require_max_len("recipient_contact", &self.recipient_contact, 64)?;
        require_non_empty("location", &self.location)?;
        require_max_len("location", &self.location, 255)
    }
}

/// Re-drive the chain write of a good's unconfirmed stage.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResubmitStage {
    pub good_id: String,
}

impl Validate for ResubmitStage {
    fn validate(&self) -> Result<(), String> {
        require_non_empty("good_id", &self.good_id)
    }
}

fn parse_date_or_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
