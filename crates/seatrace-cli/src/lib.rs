//! # seatrace-cli -- Operator Command-Line Interface
//!
//! Chain-side inspection for operators: what the contract holds for a
//! good, the node's block height, raw transactions, and whether a
//! company's configured chain address is well formed.
//!
//! ## Subcommands
//!
//! - `block-number`: current block height
//! - `trace <GOOD_ID>`: the contract's full record of a good
//! - `status <GOOD_ID>`: the status the contract holds for a good
//! - `tx <HASH>`: a transaction as the node reports it
//! - `check-address <ADDR>`: offline address shape check
//!
//! Every command prints one JSON document on stdout. Handlers take a
//! [`ChainGateway`](seatrace_chain_client::ChainGateway) so they run
//! unchanged against a mock gateway.

pub mod address;
pub mod chain;
