//! Balance ledger for virtual sub-accounts of the deposit base
//!
//! Credits arrive through the [`scanner::DepositScanner`]; debits of internal
//! transfers are written by the transaction lifecycle. Both go through the
//! same record-then-refresh path of the balance store.

pub mod memo;
pub mod scanner;
pub mod service;

pub use memo::{parse_virtual_address, usable_memo, virtual_address};
pub use scanner::{DepositScanner, ScanReport};
pub use service::BalanceService;
