//! # Goods Lifecycle Status and Stages
//!
//! ```text
//! Produced ──▶ Shipped ──▶ Inspected ──▶ Delivered (terminal)
//!   ▲            ▲            ▲              ▲
//!   │            │            │              │
//! Production  Transport   Inspection      Delivery      (stage that produces it)
//! ```
//!
//! `GoodStatus` is totally ordered by declaration, which is the order the
//! state machine walks. The integer codes (1..=4) are only a storage and
//! wire codec; guards compare enum values.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ─── Status ──────────────────────────────────────────────────────────

/// Coarse lifecycle status of a good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum GoodStatus {
    /// Registered by its producer.
    Produced = 1,
    /// Handed over to a shipper.
    Shipped = 2,
    /// Checked at a port or by an inspector.
    Inspected = 3,
    /// Delivered to a dealer (terminal).
    Delivered = 4,
}

impl GoodStatus {
    /// Every status in lifecycle order.
    pub const ALL: [GoodStatus; 4] = [
        Self::Produced,
        Self::Shipped,
        Self::Inspected,
        Self::Delivered,
    ];

    /// Storage / wire code (1..=4).
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Decode a storage / wire code.
    pub fn from_code(code: i64) -> Result<Self, ValidationError> {
        match code {
            1 => Ok(Self::Produced),
            2 => Ok(Self::Shipped),
            3 => Ok(Self::Inspected),
            4 => Ok(Self::Delivered),
            other => Err(ValidationError::InvalidStatusCode(other)),
        }
    }

    /// The status that follows this one, if any.
    pub fn next(&self) -> Option<GoodStatus> {
        match self {
            Self::Produced => Some(Self::Shipped),
            Self::Shipped => Some(Self::Inspected),
            Self::Inspected => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Whether no further transition is defined.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Human-readable label used in API responses.
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Produced => "Produced",
            Self::Shipped => "Shipped",
            Self::Inspected => "Inspected",
            Self::Delivered => "Delivered",
        }
    }

    /// The stage whose completion puts a good into this status.
    pub fn produced_by(&self) -> Stage {
        match self {
            Self::Produced => Stage::Production,
            Self::Shipped => Stage::Transport,
            Self::Inspected => Stage::Inspection,
            Self::Delivered => Stage::Delivery,
        }
    }
}

impl std::fmt::Display for GoodStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Produced => "PRODUCED",
            Self::Shipped => "SHIPPED",
            Self::Inspected => "INSPECTED",
            Self::Delivered => "DELIVERED",
        };
        f.write_str(s)
    }
}

impl TryFrom<u8> for GoodStatus {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_code(i64::from(value))
    }
}

impl From<GoodStatus> for u8 {
    fn from(status: GoodStatus) -> Self {
        status.code()
    }
}

// ─── Stage ───────────────────────────────────────────────────────────

/// One of the four lifecycle steps, each with its own record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Production,
    Transport,
    Inspection,
    Delivery,
}

impl Stage {
    /// Every stage in lifecycle order.
    pub const ALL: [Stage; 4] = [
        Self::Production,
        Self::Transport,
        Self::Inspection,
        Self::Delivery,
    ];

    /// Stable snake_case name (storage, metrics labels, API).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Transport => "transport",
            Self::Inspection => "inspection",
            Self::Delivery => "delivery",
        }
    }

    /// Status a good must be in before this stage may run.
    ///
    /// `None` for Production: registration creates the good.
    pub fn required_status(&self) -> Option<GoodStatus> {
        match self {
            Self::Production => None,
            Self::Transport => Some(GoodStatus::Produced),
            Self::Inspection => Some(GoodStatus::Shipped),
            Self::Delivery => Some(GoodStatus::Inspected),
        }
    }

    /// Status a good is in once this stage is confirmed.
    pub fn resulting_status(&self) -> GoodStatus {
        match self {
            Self::Production => GoodStatus::Produced,
            Self::Transport => GoodStatus::Shipped,
            Self::Inspection => GoodStatus::Inspected,
            Self::Delivery => GoodStatus::Delivered,
        }
    }

    /// The stage that must be chain-confirmed before this one.
    pub fn predecessor(&self) -> Option<Stage> {
        self.required_status().map(|s| s.produced_by())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "production" => Ok(Self::Production),
            "transport" => Ok(Self::Transport),
            "inspection" => Ok(Self::Inspection),
            "delivery" => Ok(Self::Delivery),
            other => Err(ValidationError::UnknownStage(other.to_string())),
        }
    }
}
