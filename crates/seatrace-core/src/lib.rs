//! # seatrace-core -- Foundational Types for Goods Traceability
//!
//! This crate is the leaf of the seatrace workspace. It defines the
//! closed vocabularies every other crate relies on, so that a lifecycle
//! status, a stage, or a company type is never passed around as a bare
//! integer or string.
//!
//! ## Key Design Principles
//!
//! 1. **Closed enumerations with explicit codecs.** [`GoodStatus`] and
//!    [`CompanyType`] carry the integer codes used by the relational store
//!    and the chain contract, but comparisons go through the enum's total
//!    order (`Produced < Shipped < Inspected < Delivered`), never through
//!    raw integers.
//!
//! 2. **Newtype identifiers.** [`GoodId`], [`CompanyId`] and [`UserId`]
//!    prevent a company id from being passed where a user id is expected.
//!    `GoodId` is the business identifier shared by the store and the chain.
//!
//! 3. **Formatting is separate from ordering.** Display text
//!    ([`GoodStatus::status_text`]) is a function of the enum, not a lookup
//!    table keyed by integers.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `seatrace-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod chain_status;
pub mod company;
pub mod error;
pub mod identity;
pub mod status;

pub use chain_status::ChainStatus;
pub use company::{BlockchainAddress, CompanyType};
pub use error::ValidationError;
pub use identity::{CompanyId, GoodId, UserId};
pub use status::{GoodStatus, Stage};
