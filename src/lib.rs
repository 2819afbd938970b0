//! Stellar Gateway - transaction lifecycle and balance reconciliation
//!
//! Builds unsigned transfers, broadcasts signed envelopes, reconciles them
//! against the network, and keeps a derived balance ledger for virtual
//! sub-accounts of one shared deposit address.
//!
//! # Modules
//!
//! - [`core_types`] - Operation ids, amounts, ledger ordinals
//! - [`money`] - Stroop / lumen conversion
//! - [`xdr`] - Envelope and result codec, strkey
//! - [`horizon`] - Network client contract and Horizon implementation
//! - [`store`] - Build, broadcast, observation and balance stores
//! - [`transaction`] - Build, broadcast, internal transfers, reconciliation
//! - [`balance`] - Memo routing and the deposit scanner
//! - [`jobs`] - Periodic job loops

// Core types - must be first!
pub mod core_types;

pub mod money;
pub mod xdr;

pub mod horizon;
pub mod store;

pub mod balance;
pub mod transaction;

pub mod config;
pub mod jobs;
pub mod logging;

// Convenient re-exports at crate root
pub use balance::BalanceService;
pub use core_types::{LedgerOrdinal, OperationHash, OperationId, Stroops};
pub use horizon::{HorizonClient, NetworkClient};
pub use store::Stores;
pub use transaction::{GatewaySettings, JobError, TransactionError, TransactionService};
