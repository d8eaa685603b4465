//! ledgerindex-core: foundation for the sequential ledger indexer.
//!
//! # Architecture
//!
//! ```text
//! SyncEngine (ledgerindex-rivine)
//!     ├── ChainClient       (node HTTP API)
//!     ├── RateProvider      (exchange-rate snapshot per block)
//!     ├── LedgerStore       (blocks, transactions, wallets; atomic BlockCommit)
//!     ├── SyncCursor        (derived from the highest committed height)
//!     └── SnapshotPublisher (recent blocks + supply stats → SnapshotCache)
//! ```

pub mod cursor;
pub mod error;
pub mod indexer;
pub mod rates;
pub mod retry;
pub mod snapshot;
pub mod store;
pub mod types;

pub use cursor::SyncCursor;
pub use error::IndexerError;
pub use indexer::{IndexerState, SyncConfig};
pub use rates::{FixedRateProvider, RateProvider};
pub use retry::{RetryConfig, RetryPolicy};
pub use snapshot::{MemorySnapshotCache, PublishReport, SnapshotCache, SnapshotPublisher, SupplyStats};
pub use store::{BalanceEffect, BlockCommit, EffectKind, LedgerStore};
pub use types::{Block, BlockRef, Input, MinerPayout, Output, RateSnapshot, Transaction, Wallet};
