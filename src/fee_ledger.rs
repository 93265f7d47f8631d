//! Fee ledger: orchestrates the two dynamic-fee trackers, keeps the
//! per-recipient entitlement book, and computes the unit-denominated
//! entrance/exit fees the request queues deduct around mint/burn.

use log::info;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::FundError;
use crate::fee_trackers::{ManagementFeeTracker, PerformanceFeeTracker};
use crate::fixed::{self, BPS_DENOMINATOR};
use crate::AccountId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeRecipients {
    pub management: AccountId,
    pub performance: AccountId,
    pub entrance: AccountId,
    pub exit: AccountId,
}

#[derive(Debug, Clone, Copy)]
pub struct FeeConfig {
    pub management_bps: u16,
    pub performance_bps: u16,
    pub entrance_bps: u16,
    pub exit_bps: u16,
    pub recipients: FeeRecipients,
}

pub struct FeeLedger {
    management: ManagementFeeTracker,
    performance: PerformanceFeeTracker,
    entrance_rate_bps: u16,
    exit_rate_bps: u16,
    recipients: FeeRecipients,
    /// Signed running balance of value owed per recipient; claims reduce it.
    entitlements: FxHashMap<AccountId, i128>,
}

impl FeeLedger {
    pub fn new(config: FeeConfig) -> Result<Self, FundError> {
        if config.entrance_bps as u128 >= BPS_DENOMINATOR {
            return Err(FundError::ExceedsBound { rate_bps: config.entrance_bps });
        }
        if config.exit_bps as u128 >= BPS_DENOMINATOR {
            return Err(FundError::ExceedsBound { rate_bps: config.exit_bps });
        }
        Ok(Self {
            management: ManagementFeeTracker::new(config.management_bps)?,
            performance: PerformanceFeeTracker::new(config.performance_bps)?,
            entrance_rate_bps: config.entrance_bps,
            exit_rate_bps: config.exit_bps,
            recipients: config.recipients,
            entitlements: FxHashMap::default(),
        })
    }

    pub fn recipients(&self) -> &FeeRecipients {
        &self.recipients
    }

    /// Settle the management fee alone against the fund's current position
    /// value. Used when the rate changes between full settlements.
    pub fn settle_management(
        &mut self,
        total_positions_value: i128,
        now: u64,
    ) -> Result<i128, FundError> {
        let net = total_positions_value
            .checked_sub(self.total_value_owed())
            .ok_or(FundError::MathOverflow("net value for fee settlement"))?;
        let due = self.management.settle(net, now)?;
        self.credit(self.recipients.management, due)?;
        Ok(due)
    }

    /// Settle both dynamic fees against the fund's current position value.
    ///
    /// The net value presented to each tracker is positions minus what the
    /// ledger owes at that point; the performance tracker sees the
    /// management fee just accrued, so the same value is never charged twice.
    pub fn settle_dynamic_fees(
        &mut self,
        total_positions_value: i128,
        supply: u128,
        now: u64,
        default_price: u128,
    ) -> Result<(i128, i128), FundError> {
        let management_due = self.settle_management(total_positions_value, now)?;

        let net_after_management = total_positions_value
            .checked_sub(self.total_value_owed())
            .ok_or(FundError::MathOverflow("net value after management fee"))?;
        let performance_due =
            self.performance.settle(net_after_management, supply, default_price)?;
        self.credit(self.recipients.performance, performance_due)?;

        info!(
            target: "fees",
            "dynamic fees settled at {}: management {} performance {}",
            now, management_due, performance_due
        );
        Ok((management_due, performance_due))
    }

    /// Entrance fee in units, floor of gross * rate. Truncation to zero
    /// means no fee is taken.
    pub fn settle_entrance_fee(&self, gross_units: u128) -> Result<u128, FundError> {
        fixed::mul_div(gross_units, self.entrance_rate_bps as u128, BPS_DENOMINATOR)
    }

    /// Exit fee in units, symmetric to the entrance fee.
    pub fn settle_exit_fee(&self, gross_units: u128) -> Result<u128, FundError> {
        fixed::mul_div(gross_units, self.exit_rate_bps as u128, BPS_DENOMINATOR)
    }

    /// Reduce `recipient`'s entitlement by a claimed amount. The matching
    /// asset transfer happens in the caller's same unit of work.
    pub fn claim(&mut self, recipient: AccountId, amount: u128) -> Result<(), FundError> {
        let available = self.entitlement_of(recipient);
        if available < 0 || (amount as i128) > available {
            return Err(FundError::InsufficientEntitlement { available, requested: amount });
        }
        let entry = self.entitlements.entry(recipient).or_insert(0);
        *entry -= amount as i128;
        Ok(())
    }

    pub fn entitlement_of(&self, recipient: AccountId) -> i128 {
        self.entitlements.get(&recipient).copied().unwrap_or(0)
    }

    /// Total value owed to all recipients; the valuation engine subtracts
    /// this liability from the position total.
    pub fn total_value_owed(&self) -> i128 {
        self.entitlements.values().filter(|v| **v > 0).sum()
    }

    pub fn management(&self) -> &ManagementFeeTracker {
        &self.management
    }

    pub fn performance(&self) -> &PerformanceFeeTracker {
        &self.performance
    }

    pub fn entrance_rate_bps(&self) -> u16 {
        self.entrance_rate_bps
    }

    pub fn exit_rate_bps(&self) -> u16 {
        self.exit_rate_bps
    }

    pub fn reset_last_settled(&mut self, now: u64) -> Result<(), FundError> {
        self.management.reset_last_settled(now)
    }

    pub fn reset_high_water_mark(&mut self, mark: u128) -> Result<(), FundError> {
        self.performance.reset_high_water_mark(mark)
    }

    pub fn set_management_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        self.management.set_rate(rate_bps)
    }

    pub fn set_performance_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        self.performance.set_rate(rate_bps)
    }

    pub fn set_entrance_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        if rate_bps as u128 >= BPS_DENOMINATOR {
            return Err(FundError::ExceedsBound { rate_bps });
        }
        self.entrance_rate_bps = rate_bps;
        Ok(())
    }

    pub fn set_exit_rate(&mut self, rate_bps: u16) -> Result<(), FundError> {
        if rate_bps as u128 >= BPS_DENOMINATOR {
            return Err(FundError::ExceedsBound { rate_bps });
        }
        self.exit_rate_bps = rate_bps;
        Ok(())
    }

    fn credit(&mut self, recipient: AccountId, amount: i128) -> Result<(), FundError> {
        if amount == 0 {
            return Ok(());
        }
        let entry = self.entitlements.entry(recipient).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(FundError::MathOverflow("entitlement"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::{PRECISION, SECONDS_PER_YEAR};

    fn recipients() -> FeeRecipients {
        FeeRecipients { management: 90, performance: 91, entrance: 92, exit: 93 }
    }

    fn ledger(management_bps: u16, performance_bps: u16) -> FeeLedger {
        FeeLedger::new(FeeConfig {
            management_bps,
            performance_bps,
            entrance_bps: 100,
            exit_bps: 50,
            recipients: recipients(),
        })
        .unwrap()
    }

    #[test]
    fn test_entrance_fee_floor() {
        let fees = ledger(0, 0);
        // 100 bps of 10_000 units
        assert_eq!(fees.settle_entrance_fee(10_000).unwrap(), 100);
        // truncation to zero: no fee
        assert_eq!(fees.settle_entrance_fee(99).unwrap(), 0);
        assert_eq!(fees.settle_exit_fee(199).unwrap(), 0);
        assert_eq!(fees.settle_exit_fee(200).unwrap(), 1);
    }

    #[test]
    fn test_dynamic_settlement_credits_recipients() {
        let mut fees = ledger(500, 0);
        fees.reset_last_settled(1).unwrap();
        fees.reset_high_water_mark(PRECISION).unwrap();

        let (management, performance) = fees
            .settle_dynamic_fees(1_000_000, PRECISION, 1 + SECONDS_PER_YEAR, PRECISION)
            .unwrap();
        assert_eq!(management, 50_000);
        assert_eq!(performance, 0);
        assert_eq!(fees.entitlement_of(90), 50_000);
        assert_eq!(fees.total_value_owed(), 50_000);
    }

    #[test]
    fn test_settlement_nets_out_existing_liability() {
        let mut fees = ledger(500, 0);
        fees.reset_last_settled(1).unwrap();
        fees.reset_high_water_mark(PRECISION).unwrap();

        fees.settle_dynamic_fees(1_000_000, PRECISION, 1 + SECONDS_PER_YEAR, PRECISION).unwrap();
        // second year: the 50_000 owed is a liability, so the base shrinks
        let (management, _) = fees
            .settle_dynamic_fees(1_000_000, PRECISION, 1 + 2 * SECONDS_PER_YEAR, PRECISION)
            .unwrap();
        assert_eq!(management, 47_500);
    }

    #[test]
    fn test_claim_bounds() {
        let mut fees = ledger(500, 0);
        fees.reset_last_settled(1).unwrap();
        fees.reset_high_water_mark(PRECISION).unwrap();
        fees.settle_dynamic_fees(1_000_000, PRECISION, 1 + SECONDS_PER_YEAR, PRECISION).unwrap();

        assert!(matches!(
            fees.claim(90, 50_001),
            Err(FundError::InsufficientEntitlement { available: 50_000, requested: 50_001 })
        ));
        fees.claim(90, 30_000).unwrap();
        assert_eq!(fees.entitlement_of(90), 20_000);
        fees.claim(90, 20_000).unwrap();
        assert_eq!(fees.total_value_owed(), 0);
    }

    #[test]
    fn test_claim_unknown_recipient() {
        let mut fees = ledger(0, 0);
        assert!(fees.claim(77, 1).is_err());
    }
}
