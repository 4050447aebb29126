//! On-disk persistence: per-day JSON-lines ledgers of activity spans and
//! per-session summary files.

pub mod entities;
pub mod ledger_storage;

pub use ledger_storage::{DayFileHandle, LedgerStorage, LedgerStorageImpl};
