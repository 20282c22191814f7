//! Token balance ledger.
//!
//! The accounting core never stores balances itself; every debit and credit
//! goes through a [`BalanceLedger`]. [`InMemoryLedger`] is the implementation
//! the [`Exchange`](crate::Exchange) is built on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::UNLIMITED_ALLOWANCE;
use crate::state::{Address, Amount, TokenId};

/// Per-holder balances for any number of denominations plus native currency.
///
/// Transfers report failure with `false` and leave balances untouched; a
/// balance can never go negative.
pub trait BalanceLedger {
    fn balance_of(&self, account: &Address, token: &TokenId) -> Amount;

    fn transfer(&mut self, from: &Address, to: &Address, token: &TokenId, amount: Amount) -> bool;

    fn allowance(&self, owner: &Address, spender: &Address, token: &TokenId) -> Amount;

    /// Set the amount `spender` may move out of `owner`'s balance.
    /// [`UNLIMITED_ALLOWANCE`] is never decremented.
    fn approve(&mut self, owner: &Address, spender: &Address, token: &TokenId, amount: Amount);

    /// Move `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        token: &TokenId,
        amount: Amount,
    ) -> bool;

    fn native_balance_of(&self, account: &Address) -> Amount;

    fn transfer_native(&mut self, from: &Address, to: &Address, amount: Amount) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// token → holder → balance
    balances: BTreeMap<TokenId, BTreeMap<Address, Amount>>,
    /// token → owner → spender → allowance
    allowances: BTreeMap<TokenId, BTreeMap<Address, BTreeMap<Address, Amount>>>,
    native: BTreeMap<Address, Amount>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued tokens. Returns false on overflow.
    pub fn mint(&mut self, account: &Address, token: &TokenId, amount: Amount) -> bool {
        let slot = self.balances.entry(*token).or_default().entry(*account).or_default();
        match slot.checked_add(amount) {
            Some(v) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    pub fn mint_native(&mut self, account: &Address, amount: Amount) -> bool {
        let slot = self.native.entry(*account).or_default();
        match slot.checked_add(amount) {
            Some(v) => {
                *slot = v;
                true
            }
            None => false,
        }
    }

    /// Sum of all holder balances for a denomination.
    pub fn total_supply(&self, token: &TokenId) -> Amount {
        self.balances
            .get(token)
            .map(|holders| holders.values().fold(0u128, |acc, v| acc.saturating_add(*v)))
            .unwrap_or(0)
    }

    /// Non-zero balances held by `account`, by denomination.
    pub fn holdings(&self, account: &Address) -> Vec<(TokenId, Amount)> {
        self.balances
            .iter()
            .filter_map(|(token, holders)| {
                holders.get(account).filter(|v| **v > 0).map(|v| (*token, *v))
            })
            .collect()
    }
}

/// Debit `from` and credit `to` inside one map; untouched on failure.
fn move_between(
    holders: &mut BTreeMap<Address, Amount>,
    from: &Address,
    to: &Address,
    amount: Amount,
) -> bool {
    let have = holders.get(from).copied().unwrap_or(0);
    if have < amount {
        return false;
    }
    if from == to {
        return true;
    }
    let credited = holders.get(to).copied().unwrap_or(0);
    let Some(credited) = credited.checked_add(amount) else {
        return false;
    };
    holders.insert(*from, have - amount);
    holders.insert(*to, credited);
    true
}

impl BalanceLedger for InMemoryLedger {
    fn balance_of(&self, account: &Address, token: &TokenId) -> Amount {
        self.balances
            .get(token)
            .and_then(|holders| holders.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, token: &TokenId, amount: Amount) -> bool {
        if to.is_zero() {
            return false;
        }
        match self.balances.get_mut(token) {
            Some(holders) => move_between(holders, from, to, amount),
            None => amount == 0,
        }
    }

    fn allowance(&self, owner: &Address, spender: &Address, token: &TokenId) -> Amount {
        self.allowances
            .get(token)
            .and_then(|owners| owners.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn approve(&mut self, owner: &Address, spender: &Address, token: &TokenId, amount: Amount) {
        self.allowances
            .entry(*token)
            .or_default()
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        token: &TokenId,
        amount: Amount,
    ) -> bool {
        let allowed = self.allowance(from, spender, token);
        if allowed < amount {
            return false;
        }
        if !self.transfer(from, to, token, amount) {
            return false;
        }
        if allowed != UNLIMITED_ALLOWANCE {
            self.approve(from, spender, token, allowed - amount);
        }
        true
    }

    fn native_balance_of(&self, account: &Address) -> Amount {
        self.native.get(account).copied().unwrap_or(0)
    }

    fn transfer_native(&mut self, from: &Address, to: &Address, amount: Amount) -> bool {
        if to.is_zero() {
            return false;
        }
        move_between(&mut self.native, from, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InMemoryLedger, Address, Address, TokenId) {
        let mut ledger = InMemoryLedger::new();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        let usdc = Address::token("USDC");
        assert!(ledger.mint(&alice, &usdc, 1_000));
        (ledger, alice, bob, usdc)
    }

    #[test]
    fn transfer_moves_balance() {
        let (mut ledger, alice, bob, usdc) = setup();
        assert!(ledger.transfer(&alice, &bob, &usdc, 400));
        assert_eq!(ledger.balance_of(&alice, &usdc), 600);
        assert_eq!(ledger.balance_of(&bob, &usdc), 400);
        assert_eq!(ledger.total_supply(&usdc), 1_000);
    }

    #[test]
    fn transfer_never_goes_negative() {
        let (mut ledger, alice, bob, usdc) = setup();
        assert!(!ledger.transfer(&alice, &bob, &usdc, 1_001));
        assert_eq!(ledger.balance_of(&alice, &usdc), 1_000);
        assert!(!ledger.transfer(&alice, &Address::ZERO, &usdc, 1));
    }

    #[test]
    fn rejected_transfer_leaves_ledger_untouched() {
        let (mut ledger, alice, bob, _) = setup();
        let before = ledger.clone();
        let dai = Address::token("DAI");
        assert!(!ledger.transfer(&alice, &bob, &dai, 1));
        assert!(ledger.transfer(&alice, &bob, &dai, 0));
        assert_eq!(ledger, before);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let (mut ledger, alice, bob, usdc) = setup();
        let pool = Address::pool("p");
        assert!(!ledger.transfer_from(&pool, &alice, &pool, &usdc, 10));

        ledger.approve(&alice, &pool, &usdc, 100);
        assert!(ledger.transfer_from(&pool, &alice, &pool, &usdc, 60));
        assert_eq!(ledger.allowance(&alice, &pool, &usdc), 40);
        assert!(!ledger.transfer_from(&pool, &alice, &bob, &usdc, 41));
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let (mut ledger, alice, bob, usdc) = setup();
        ledger.approve(&alice, &bob, &usdc, UNLIMITED_ALLOWANCE);
        assert!(ledger.transfer_from(&bob, &alice, &bob, &usdc, 500));
        assert_eq!(ledger.allowance(&alice, &bob, &usdc), UNLIMITED_ALLOWANCE);
    }

    #[test]
    fn native_balances_are_separate() {
        let (mut ledger, alice, bob, usdc) = setup();
        assert!(ledger.mint_native(&alice, 7));
        assert!(ledger.transfer_native(&alice, &bob, 7));
        assert_eq!(ledger.native_balance_of(&bob), 7);
        assert_eq!(ledger.balance_of(&bob, &usdc), 0);
        assert_eq!(ledger.holdings(&alice), vec![(usdc, 1_000)]);
    }
}
