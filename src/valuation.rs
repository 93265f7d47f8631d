//! Valuation engine: aggregates position values and owed-fee liabilities
//! into a NAV and a per-unit price, converting asset-denominated amounts
//! through the oracle rate reader.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::errors::FundError;
use crate::fixed::{self, ACCOUNTING_DECIMALS, PRECISION};
use crate::oracle::OracleRateReader;
use crate::positions::PositionTracker;
use crate::AssetId;

/// Per-unit price at a point in time. Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub price_per_unit: u128,
    pub as_of: u64,
}

#[derive(Debug, Clone, Copy)]
struct AssetInfo {
    decimals: u32,
    /// Natively denominated in the accounting currency: converts 1:1
    /// modulo rescaling, no oracle consult.
    is_accounting: bool,
}

pub struct Valuator {
    positions: Vec<Arc<dyn PositionTracker>>,
    oracle: OracleRateReader,
    assets: FxHashMap<AssetId, AssetInfo>,
}

impl Valuator {
    pub fn new(oracle: OracleRateReader) -> Self {
        Self { positions: Vec::new(), oracle, assets: FxHashMap::default() }
    }

    pub fn register_asset(&mut self, asset: AssetId, decimals: u32, is_accounting: bool) {
        self.assets.insert(asset, AssetInfo { decimals, is_accounting });
    }

    pub fn add_position(&mut self, tracker: Arc<dyn PositionTracker>) {
        self.positions.push(tracker);
    }

    /// Σ tracker values, in the 18-decimal accounting currency.
    pub fn total_positions_value(&self) -> Result<i128, FundError> {
        let mut total: i128 = 0;
        for tracker in &self.positions {
            let value = tracker.current_value()?;
            debug!(target: "valuation", "position {} valued at {}", tracker.label(), value);
            total = total
                .checked_add(value)
                .ok_or(FundError::MathOverflow("total positions value"))?;
        }
        Ok(total)
    }

    /// NAV = positions − fees owed.
    pub fn net_value(&self, total_value_owed: i128) -> Result<i128, FundError> {
        let positions = self.total_positions_value()?;
        positions.checked_sub(total_value_owed).ok_or(FundError::MathOverflow("net value"))
    }

    /// Per-unit price for a given NAV and supply. Undefined at zero supply;
    /// callers special-case that, typically via a configured default price.
    pub fn price_per_unit(
        &self,
        nav: i128,
        supply: u128,
        now: u64,
    ) -> Result<PriceSnapshot, FundError> {
        if supply == 0 {
            return Err(FundError::ZeroSupply);
        }
        if nav <= 0 {
            return Err(FundError::InvalidAmount(format!(
                "net asset value {} is not positive",
                nav
            )));
        }
        let price_per_unit = fixed::mul_div(nav as u128, PRECISION, supply)?;
        Ok(PriceSnapshot { price_per_unit, as_of: now })
    }

    /// Value (18-decimal accounting currency) of `amount` of `asset`.
    ///
    /// value = amount * rate * 10^18 / (10^asset_decimals * 10^rate_decimals),
    /// multiply-before-divide.
    pub fn convert_asset_to_value(
        &self,
        asset: AssetId,
        amount: u128,
        now: u64,
    ) -> Result<u128, FundError> {
        let info = self.asset_info(asset)?;
        if info.is_accounting {
            return fixed::scale_amount(amount, info.decimals, ACCOUNTING_DECIMALS);
        }
        let reading = self.oracle.read(asset, now)?;
        let denom = fixed::pow10(
            info.decimals
                .checked_add(reading.decimals)
                .ok_or(FundError::MathOverflow("conversion decimals"))?,
        )?;
        fixed::mul3_div(amount, reading.rate as u128, PRECISION, denom)
    }

    /// Inverse of [`convert_asset_to_value`]: the asset amount worth `value`.
    pub fn convert_value_to_asset(
        &self,
        value: u128,
        asset: AssetId,
        now: u64,
    ) -> Result<u128, FundError> {
        let info = self.asset_info(asset)?;
        if info.is_accounting {
            return fixed::scale_amount(value, ACCOUNTING_DECIMALS, info.decimals);
        }
        let reading = self.oracle.read(asset, now)?;
        let numerator_scale = fixed::pow10(
            info.decimals
                .checked_add(reading.decimals)
                .ok_or(FundError::MathOverflow("conversion decimals"))?,
        )?;
        let denom = (reading.rate as u128)
            .checked_mul(PRECISION)
            .ok_or(FundError::MathOverflow("conversion denominator"))?;
        fixed::mul_div(value, numerator_scale, denom)
    }

    fn asset_info(&self, asset: AssetId) -> Result<AssetInfo, FundError> {
        self.assets.get(&asset).copied().ok_or(FundError::UnknownAsset(asset))
    }
}

/// Per-share value for a total value and supply.
pub fn calc_value_per_share(total_value: u128, supply: u128) -> Result<u128, FundError> {
    if supply == 0 {
        return Err(FundError::ZeroSupply);
    }
    fixed::mul_div(total_value, PRECISION, supply)
}

/// Value of `shares` at `value_per_share`.
pub fn calc_value_of_shares_amount(
    value_per_share: u128,
    shares: u128,
) -> Result<u128, FundError> {
    fixed::mul_div(shares, value_per_share, PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::PRECISION;
    use crate::oracle::{RateReading, RateSource, StaticRateSource};
    use crate::positions::StaticPosition;

    const USD: AssetId = 0;
    const WBTC: AssetId = 1;

    /// The reader owns its source, so tests keep a second handle through
    /// this forwarding wrapper.
    struct Shared(Arc<StaticRateSource>);

    impl RateSource for Shared {
        fn latest(&self, asset: AssetId) -> Result<RateReading, FundError> {
            self.0.latest(asset)
        }
    }

    fn build_valuator(tolerance: u64) -> (Valuator, Arc<StaticRateSource>) {
        let source = Arc::new(StaticRateSource::new());
        let reader = OracleRateReader::new(Box::new(Shared(source.clone())), tolerance);
        let mut valuator = Valuator::new(reader);
        valuator.register_asset(USD, 6, true);
        valuator.register_asset(WBTC, 8, false);
        (valuator, source)
    }

    #[test]
    fn test_calc_value_per_share_round_trip() {
        let per_share = calc_value_per_share(5_000, 5 * PRECISION).unwrap();
        assert_eq!(per_share, 1_000);
        assert_eq!(calc_value_of_shares_amount(1_000, 5 * PRECISION).unwrap(), 5_000);
    }

    #[test]
    fn test_calc_value_per_share_zero_supply() {
        assert!(matches!(calc_value_per_share(5_000, 0), Err(FundError::ZeroSupply)));
    }

    #[test]
    fn test_accounting_asset_converts_by_rescaling() {
        let (valuator, _source) = build_valuator(60);
        // 1.5 units of a 6-decimal accounting asset
        let value = valuator.convert_asset_to_value(USD, 1_500_000, 100).unwrap();
        assert_eq!(value, 1_500_000_000_000_000_000);
        assert_eq!(valuator.convert_value_to_asset(value, USD, 100).unwrap(), 1_500_000);
    }

    #[test]
    fn test_oracle_asset_conversion() {
        let (valuator, source) = build_valuator(60);
        // 50,000.00 accounting units per whole asset, 8 rate decimals
        source.set(WBTC, RateReading { rate: 50_000_00000000, decimals: 8, updated_at: 100 });

        // 0.5 of an 8-decimal asset -> 25,000 accounting units
        let value = valuator.convert_asset_to_value(WBTC, 50_000_000, 100).unwrap();
        assert_eq!(value, 25_000 * PRECISION);

        let back = valuator.convert_value_to_asset(value, WBTC, 100).unwrap();
        assert_eq!(back, 50_000_000);
    }

    #[test]
    fn test_conversion_rejects_stale_reading() {
        let (valuator, source) = build_valuator(60);
        source.set(WBTC, RateReading { rate: 1_00000000, decimals: 8, updated_at: 10 });
        assert!(matches!(
            valuator.convert_asset_to_value(WBTC, 1, 1000),
            Err(FundError::StaleOracleData { .. })
        ));
    }

    #[test]
    fn test_nav_aggregates_positions_minus_owed() {
        let (mut valuator, _source) = build_valuator(60);
        valuator.add_position(Arc::new(StaticPosition::new("treasury", 10_000)));
        valuator.add_position(Arc::new(StaticPosition::new("loan", -2_500)));
        assert_eq!(valuator.total_positions_value().unwrap(), 7_500);
        assert_eq!(valuator.net_value(500).unwrap(), 7_000);
    }

    #[test]
    fn test_price_per_unit() {
        let (valuator, _source) = build_valuator(60);
        let snapshot = valuator.price_per_unit(7_000, 7 * PRECISION, 42).unwrap();
        assert_eq!(snapshot.price_per_unit, 1_000);
        assert_eq!(snapshot.as_of, 42);

        assert!(matches!(
            valuator.price_per_unit(7_000, 0, 42),
            Err(FundError::ZeroSupply)
        ));
        assert!(valuator.price_per_unit(0, PRECISION, 42).is_err());
    }
}
