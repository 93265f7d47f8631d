//! Minimal account book for the deposit asset (the accounting currency as
//! held by depositors, the queue escrow and the treasury). The engine only
//! needs credit, checked debit and transfer; custody of the real asset is
//! an external concern.

use rustc_hash::FxHashMap;

use crate::errors::FundError;
use crate::{AccountId, AssetId};

pub struct AssetBook {
    asset: AssetId,
    decimals: u32,
    balances: FxHashMap<AccountId, u128>,
}

impl AssetBook {
    pub fn new(asset: AssetId, decimals: u32) -> Self {
        Self { asset, decimals, balances: FxHashMap::default() }
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn balance_of(&self, account: AccountId) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, account: AccountId, amount: u128) -> Result<(), FundError> {
        let balance = self.balances.entry(account).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(FundError::MathOverflow("asset balance"))?;
        Ok(())
    }

    pub fn debit(&mut self, account: AccountId, amount: u128) -> Result<(), FundError> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(FundError::InsufficientBalance {
                account,
                available,
                required: amount,
            });
        }
        self.balances.insert(account, available - amount);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), FundError> {
        self.debit(from, amount)?;
        self.credit(to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_checks_balance() {
        let mut book = AssetBook::new(0, 6);
        book.credit(1, 500).unwrap();
        assert!(matches!(
            book.debit(1, 501),
            Err(FundError::InsufficientBalance { account: 1, available: 500, required: 501 })
        ));
        book.debit(1, 500).unwrap();
        assert_eq!(book.balance_of(1), 0);
    }

    #[test]
    fn test_transfer_moves_exactly() {
        let mut book = AssetBook::new(0, 6);
        book.credit(1, 300).unwrap();
        book.transfer(1, 2, 120).unwrap();
        assert_eq!(book.balance_of(1), 180);
        assert_eq!(book.balance_of(2), 120);
    }
}
