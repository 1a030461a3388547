//! # seatrace-state -- Goods Lifecycle Rules
//!
//! The lifecycle of a good is a short, strictly linear chain:
//!
//! ```text
//! Register ──▶ Ship ──▶ Inspect ──▶ Deliver
//! (Producer)  (Shipper)  (Port)     (Dealer)
//! ```
//!
//! This crate decides whether a given caller may run a given stage against
//! a good in a given status. It performs no I/O: the lifecycle engine in
//! `seatrace-api` loads the facts, asks these functions, and then performs
//! the writes. Keeping the rules pure means every guard is unit-testable
//! without a database or a chain gateway.
//!
//! The guards are plain enum comparisons rather than typestate types. The
//! good is re-read from the store on every request, so its status is only
//! ever known at runtime.

pub mod goods;

pub use goods::{
    authorize_stage, plan_transition, require_predecessor_confirmed, required_company_type,
    LifecycleError, Transition,
};
