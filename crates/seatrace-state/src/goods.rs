//! # Goods Lifecycle Guards
//!
//! ```text
//!             Production      Transport      Inspection      Delivery
//! required:   (none)          Produced       Shipped         Inspected
//! produces:   Produced        Shipped        Inspected       Delivered
//! company:    Producer        Shipper        Port            Dealer
//! ```
//!
//! Three independent checks gate a stage:
//!
//! 1. [`authorize_stage`]: the caller's company type matches the stage.
//! 2. [`plan_transition`]: the good is in the stage's required status.
//! 3. [`require_predecessor_confirmed`]: the previous stage's record has
//!    been accepted by the chain.
//!
//! The engine runs them in that order, before any write.

use serde::Serialize;
use thiserror::Error;

use seatrace_core::{ChainStatus, CompanyType, GoodId, GoodStatus, Stage};

// ─── Errors ──────────────────────────────────────────────────────────

/// A lifecycle precondition was not met.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The caller's company type may not perform this stage.
    #[error("{stage} requires a {required} company, caller's company is a {actual}")]
    WrongCompanyType {
        stage: Stage,
        required: CompanyType,
        actual: CompanyType,
    },

    /// The good is not in the status this stage requires.
    #[error("good {good_id} is {actual}, {stage} requires {expected}")]
    InvalidTransition {
        good_id: GoodId,
        stage: Stage,
        expected: GoodStatus,
        actual: GoodStatus,
    },

    /// The good has been delivered; nothing follows.
    #[error("good {good_id} is delivered and cannot transition")]
    AlreadyTerminal { good_id: GoodId },

    /// Production is only ever performed by registration.
    #[error("good {good_id} is already registered")]
    AlreadyRegistered { good_id: GoodId },

    /// The previous stage has not been confirmed on chain yet.
    #[error("good {good_id}: {predecessor} is not yet confirmed on chain, {stage} must wait")]
    PredecessorUnconfirmed {
        good_id: GoodId,
        stage: Stage,
        predecessor: Stage,
    },
}

// ─── Authorization ───────────────────────────────────────────────────

/// The only company type allowed to perform `stage`.
pub fn required_company_type(stage: Stage) -> CompanyType {
    match stage {
        Stage::Production => CompanyType::Producer,
        Stage::Transport => CompanyType::Shipper,
        Stage::Inspection => CompanyType::Port,
        Stage::Delivery => CompanyType::Dealer,
    }
}

/// Reject a caller whose company type does not match the stage.
pub fn authorize_stage(company_type: CompanyType, stage: Stage) -> Result<(), LifecycleError> {
    let required = required_company_type(stage);
    if company_type == required {
        Ok(())
    } else {
        Err(LifecycleError::WrongCompanyType {
            stage,
            required,
            actual: company_type,
        })
    }
}

// ─── Transitions ─────────────────────────────────────────────────────

/// A validated status change for one good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub stage: Stage,
    pub from: GoodStatus,
    pub to: GoodStatus,
}

/// Validate that `stage` may run against a good currently in `current`.
///
/// Returns the `from → to` pair the store must apply with a conditional
/// update. Repeated and out-of-order stages are rejected.
pub fn plan_transition(
    good_id: &GoodId,
    current: GoodStatus,
    stage: Stage,
) -> Result<Transition, LifecycleError> {
    let Some(expected) = stage.required_status() else {
        return Err(LifecycleError::AlreadyRegistered {
            good_id: good_id.clone(),
        });
    };
    if current.is_terminal() {
        return Err(LifecycleError::AlreadyTerminal {
            good_id: good_id.clone(),
        });
    }
    if current != expected {
        return Err(LifecycleError::InvalidTransition {
            good_id: good_id.clone(),
            stage,
            expected,
            actual: current,
        });
    }
    Ok(Transition {
        stage,
        from: current,
        to: stage.resulting_status(),
    })
}

/// Require the record of `stage`'s predecessor to be chain-confirmed.
///
/// `predecessor_status` is `None` when the predecessor record is missing,
/// which can only happen for data written before stage records were
/// mandatory; that is treated as unconfirmed.
pub fn require_predecessor_confirmed(
    good_id: &GoodId,
    stage: Stage,
    predecessor_status: Option<ChainStatus>,
) -> Result<(), LifecycleError> {
    let Some(predecessor) = stage.predecessor() else {
        return Ok(());
    };
    match predecessor_status {
        Some(s) if s.is_confirmed() => Ok(()),
        _ => Err(LifecycleError::PredecessorUnconfirmed {
            good_id: good_id.clone(),
            stage,
            predecessor,
        }),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
