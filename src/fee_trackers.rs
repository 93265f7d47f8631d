//! Management and performance fee trackers.
//!
//! Both are small state machines (`Uninitialized -> Accruing`) that compute a
//! value due when asked to settle against a supplied NAV. They hold only
//! their own minimal accrual state; entitlement bookkeeping lives in the fee
//! ledger, which is the sole caller of `settle`.

use serde::{Deserialize, Serialize};

use crate::errors::FundError;
use crate::fixed::{self, BPS_DENOMINATOR, PRECISION, SECONDS_PER_YEAR};

fn check_rate(rate_bps: u16) -> Result<(), FundError> {
    if rate_bps as u128 >= BPS_DENOMINATOR {
        return Err(FundError::ExceedsBound { rate_bps });
    }
    Ok(())
}

/// Continuous, time-prorated management fee.
///
/// `last_settled == 0` means uninitialized; accrual starts at the explicit
/// reset that stamps the settlement anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementFeeTracker {
    rate_bps: u16,
    last_settled: u64,
}

impl ManagementFeeTracker {
    pub fn new(rate_bps: u16) -> Result<Self, FundError> {
        check_rate(rate_bps)?;
        Ok(Self { rate_bps, last_settled: 0 })
    }

    pub fn rate_bps(&self) -> u16 {
        self.rate_bps
    }

    pub fn last_settled(&self) -> u64 {
        self.last_settled
    }

    pub fn is_initialized(&self) -> bool {
        self.last_settled != 0
    }

    /// Start (or re-anchor) accrual at `now`.
    pub fn reset_last_settled(&mut self, now: u64) -> Result<(), FundError> {
        if now == 0 {
            return Err(FundError::InvalidAmount("settlement anchor must be non-zero".into()));
        }
        self.last_settled = now;
        Ok(())
    }

    /// Rate changes apply only to time elapsed after the change; the caller
    /// settles outstanding accrual first.
    pub fn set_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        check_rate(rate_bps)?;
        self.rate_bps = rate_bps;
        Ok(())
    }

    /// due = net_value * rate_bps * elapsed / (SECONDS_PER_YEAR * 10_000).
    ///
    /// Settlement always occurs: `last_settled` advances to `now` even when
    /// the value due is zero, which makes a same-timestamp second call yield
    /// exactly zero.
    pub fn settle(&mut self, net_value: i128, now: u64) -> Result<i128, FundError> {
        if !self.is_initialized() {
            return Err(FundError::NotInitialized);
        }
        let elapsed = now.saturating_sub(self.last_settled);
        let base = net_value.max(0) as u128;
        let due = fixed::mul3_div(
            base,
            self.rate_bps as u128,
            elapsed as u128,
            SECONDS_PER_YEAR as u128 * BPS_DENOMINATOR,
        )?;
        if due > i128::MAX as u128 {
            return Err(FundError::MathOverflow("management fee due"));
        }
        self.last_settled = now;
        Ok(due as i128)
    }
}

/// High-water-mark performance fee.
///
/// `high_water_mark == 0` means uninitialized; the explicit reset stamps the
/// per-unit price at which accrual should begin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceFeeTracker {
    rate_bps: u16,
    high_water_mark: u128,
}

impl PerformanceFeeTracker {
    pub fn new(rate_bps: u16) -> Result<Self, FundError> {
        check_rate(rate_bps)?;
        Ok(Self { rate_bps, high_water_mark: 0 })
    }

    pub fn rate_bps(&self) -> u16 {
        self.rate_bps
    }

    pub fn high_water_mark(&self) -> u128 {
        self.high_water_mark
    }

    pub fn is_initialized(&self) -> bool {
        self.high_water_mark != 0
    }

    pub fn reset_high_water_mark(&mut self, mark: u128) -> Result<(), FundError> {
        if mark == 0 {
            return Err(FundError::InvalidAmount("high-water mark must be non-zero".into()));
        }
        self.high_water_mark = mark;
        Ok(())
    }

    pub fn set_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        check_rate(rate_bps)?;
        self.rate_bps = rate_bps;
        Ok(())
    }

    /// Settle against `net_value` for `supply` outstanding units.
    ///
    /// With no units outstanding the mark resets to `default_price` and
    /// nothing is due; a stale mark must not block accrual once units are
    /// reissued. Otherwise the fee applies only to the value-per-share gain
    /// above the mark, and the mark advances to the new value-per-share.
    pub fn settle(
        &mut self,
        net_value: i128,
        supply: u128,
        default_price: u128,
    ) -> Result<i128, FundError> {
        if !self.is_initialized() {
            return Err(FundError::NotInitialized);
        }
        if supply == 0 {
            self.high_water_mark = default_price;
            return Ok(0);
        }
        let net = net_value.max(0) as u128;
        let value_per_share = fixed::mul_div(net, PRECISION, supply)?;
        if value_per_share <= self.high_water_mark {
            return Ok(0);
        }
        let gain_value =
            fixed::mul_div(value_per_share - self.high_water_mark, supply, PRECISION)?;
        let due = fixed::mul_div(gain_value, self.rate_bps as u128, BPS_DENOMINATOR)?;
        if due > i128::MAX as u128 {
            return Err(FundError::MathOverflow("performance fee due"));
        }
        self.high_water_mark = value_per_share;
        Ok(due as i128)
    }
}
