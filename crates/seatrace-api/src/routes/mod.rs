//! # API Route Modules
//!
//! - `goods`: lifecycle operations, resubmission, goods list and the
//!   authenticated trace.
//! - `public`: the unauthenticated trace lookup.
//! - `chain`: read-only chain gateway queries.
//! - `health`: liveness and readiness probes.

pub mod chain;
pub mod goods;
pub mod health;
pub mod public;
