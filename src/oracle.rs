//! Oracle rate reader: validates and normalizes third-party price feed
//! readings before any valuation math consumes them. A reading that fails
//! validation is rejected, never silently zeroed.

use std::sync::RwLock;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::FundError;
use crate::AssetId;

/// A raw feed observation: rate of one whole asset in the accounting
/// currency, scaled by `10^decimals`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateReading {
    pub rate: i128,
    pub decimals: u32,
    pub updated_at: u64,
}

/// Capability interface over a price feed. Implementations report the most
/// recent observation they hold; validation happens in [`OracleRateReader`].
pub trait RateSource: Send + Sync {
    fn latest(&self, asset: AssetId) -> Result<RateReading, FundError>;
}

/// In-memory rate source, fed by tests and scripted scenarios.
#[derive(Default)]
pub struct StaticRateSource {
    rates: RwLock<FxHashMap<AssetId, RateReading>>,
}

impl StaticRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, asset: AssetId, reading: RateReading) {
        if let Ok(mut rates) = self.rates.write() {
            rates.insert(asset, reading);
        }
    }
}

impl RateSource for StaticRateSource {
    fn latest(&self, asset: AssetId) -> Result<RateReading, FundError> {
        self.rates
            .read()
            .map_err(|_| FundError::RateFeed("rate source lock poisoned".to_string()))?
            .get(&asset)
            .copied()
            .ok_or(FundError::RateUnavailable(asset))
    }
}

pub struct OracleRateReader {
    source: Box<dyn RateSource>,
    staleness_tolerance: u64,
}

impl OracleRateReader {
    pub fn new(source: Box<dyn RateSource>, staleness_tolerance: u64) -> Self {
        Self { source, staleness_tolerance }
    }

    /// Fetch and validate the latest reading for `asset`.
    ///
    /// A reading aged exactly `staleness_tolerance` seconds is still valid;
    /// one second older is not.
    pub fn read(&self, asset: AssetId, now: u64) -> Result<RateReading, FundError> {
        let reading = self.source.latest(asset)?;
        if reading.rate <= 0 {
            return Err(FundError::InvalidOracleAnswer { answer: reading.rate });
        }
        if reading.updated_at < now.saturating_sub(self.staleness_tolerance) {
            return Err(FundError::StaleOracleData {
                updated_at: reading.updated_at,
                tolerance: self.staleness_tolerance,
                now,
            });
        }
        Ok(reading)
    }
}
