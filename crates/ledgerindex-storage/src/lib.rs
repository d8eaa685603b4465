//! ledgerindex-storage: ledger store backends for LedgerIndex.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::InMemoryLedgerStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLedgerStore;
