//! HTTP-backed rate source. A poller task fetches a JSON price endpoint and
//! caches normalized readings; the synchronous engine reads the cache
//! through the `RateSource` trait and never blocks on the network.

use std::str::FromStr;
use std::sync::RwLock;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::errors::FundError;
use crate::fixed;
use crate::oracle::{RateReading, RateSource};
use crate::AssetId;

/// Expected endpoint shape: `{"price": "50123.45", "updated_at": 1722900000}`.
#[derive(Debug, Deserialize)]
struct FeedResponse {
    price: String,
    updated_at: u64,
}

#[derive(Default)]
pub struct HttpRateSource {
    cache: RwLock<FxHashMap<AssetId, RateReading>>,
}

impl HttpRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the endpoint and cache the normalized reading for `asset`.
    pub async fn refresh(
        &self,
        client: &reqwest::Client,
        url: &str,
        asset: AssetId,
        rate_decimals: u32,
    ) -> Result<RateReading, FundError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| FundError::RateFeed(format!("request failed: {}", e)))?;
        let body: FeedResponse = response
            .json()
            .await
            .map_err(|e| FundError::RateFeed(format!("malformed response: {}", e)))?;

        let price = Decimal::from_str(&body.price)
            .map_err(|e| FundError::RateFeed(format!("unparsable price {}: {}", body.price, e)))?;
        let rate = fixed::from_display(price, rate_decimals)? as i128;
        let reading = RateReading { rate, decimals: rate_decimals, updated_at: body.updated_at };

        self.cache
            .write()
            .map_err(|_| FundError::RateFeed("rate cache lock poisoned".to_string()))?
            .insert(asset, reading);
        Ok(reading)
    }
}

impl RateSource for HttpRateSource {
    fn latest(&self, asset: AssetId) -> Result<RateReading, FundError> {
        self.cache
            .read()
            .map_err(|_| FundError::RateFeed("rate cache lock poisoned".to_string()))?
            .get(&asset)
            .copied()
            .ok_or(FundError::RateUnavailable(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_before_any_refresh() {
        let source = HttpRateSource::new();
        assert!(matches!(source.latest(1), Err(FundError::RateUnavailable(1))));
    }
}
