//! Exchange-rate snapshots attached to every ingested block and transaction.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::RateSnapshot;

/// Supplies the rates in effect at call time.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn snapshot(&self) -> Result<RateSnapshot, IndexerError>;
}

/// Serves the same snapshot on every call.
#[derive(Debug, Clone, Default)]
pub struct FixedRateProvider {
    rates: RateSnapshot,
}

impl FixedRateProvider {
    pub fn new(rates: RateSnapshot) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl RateProvider for FixedRateProvider {
    async fn snapshot(&self) -> Result<RateSnapshot, IndexerError> {
        Ok(self.rates.clone())
    }
}
