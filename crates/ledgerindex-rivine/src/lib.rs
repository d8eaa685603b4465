//! ledgerindex-rivine: Rivine explorer client, payload transform and sync engine.

pub mod address;
pub mod builder;
pub mod client;
pub mod engine;
pub mod payload;
pub mod transform;

pub use builder::SyncEngineBuilder;
pub use client::{ChainClient, HttpChainClient, HttpClientConfig};
pub use engine::{RefreshSignal, SyncEngine, SyncOutcome, SyncStatus};
