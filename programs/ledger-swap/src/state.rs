use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::constants::{ACCOUNT_SEED, LOCK_SEED, POOL_SEED, STAKE_SEED, SWAP_SEED, TOKEN_SEED};

/// Token amounts in base units.
pub type Amount = u128;

/// Token denominations are identified by an address.
pub type TokenId = Address;

// ─── Address ─────────────────────────────────────────────────────────────────
// 32-byte identity shared by holders, component accounts and denominations.
// Rendered as base58; the all-zero value is the null identity.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid address '{input}': {reason}")]
pub struct ParseAddressError {
    pub input: String,
    pub reason: String,
}

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Deterministic address from a list of seeds:
    /// `sha256(len(s0) || s0 || len(s1) || s1 || …)`.
    pub fn derive(seeds: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update((seed.len() as u64).to_le_bytes());
            hasher.update(seed);
        }
        Self(hasher.finalize().into())
    }

    /// Holder account for a human-readable name.
    pub fn from_label(label: &str) -> Self {
        Self::derive(&[ACCOUNT_SEED, label.as_bytes()])
    }

    /// Denomination address for a token symbol.
    pub fn token(symbol: &str) -> Self {
        Self::derive(&[TOKEN_SEED, symbol.as_bytes()])
    }

    pub fn pool(label: &str) -> Self {
        Self::derive(&[POOL_SEED, label.as_bytes()])
    }

    pub fn stake(label: &str) -> Self {
        Self::derive(&[STAKE_SEED, label.as_bytes()])
    }

    pub fn swap(label: &str) -> Self {
        Self::derive(&[SWAP_SEED, label.as_bytes()])
    }

    pub fn lock(label: &str) -> Self {
        Self::derive(&[LOCK_SEED, label.as_bytes()])
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec().map_err(|e| ParseAddressError {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| ParseAddressError {
            input: s.to_string(),
            reason: format!("decoded to {} bytes; expected 32", b.len()),
        })?;
        Ok(Self(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ─── Pool ────────────────────────────────────────────────────────────────────
// Custodial account for a single denomination.
// Invariant: pool_balance == ledger.balance_of(account, token) between transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    /// Custodial ledger account
    pub account: Address,
    /// Managed denomination, fixed at creation
    pub token: TokenId,
    pub depositing_enabled: bool,
    /// Mirror of the ledger balance held by `account`
    pub pool_balance: Amount,
}

// ─── Stake ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    /// Timestamp of stake entry
    pub date: u64,
    /// Rate snapshot taken at stake time
    pub interest_rate: Amount,
    /// Principal; left in place after unstake
    pub amount: Amount,
    pub staked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeLedger {
    pub account: Address,
    /// Staked and rewarded denomination
    pub token: TokenId,
    /// Fixed-point base of `interest_rate`, matches the token decimals
    pub decimals: u8,
    /// Rate applied to new positions
    pub interest_rate: Amount,
    pub staking_enabled: bool,
    pub unstaking_enabled: bool,
    pub total_staker_count: u64,
    pub total_staked_token_amount: Amount,
    pub reward_token_pool_balance: Amount,
    pub positions: BTreeMap<Address, StakePosition>,
}

// ─── Swap ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEngine {
    /// Transient custody account used during a swap
    pub account: Address,
    /// Denomination → custodial pool account
    pub token_pools: BTreeMap<TokenId, Address>,
    /// token_one → token_two → ratio, directional
    pub token_ratios: BTreeMap<TokenId, BTreeMap<TokenId, Amount>>,
    /// Applied to the output amount, same fixed-point base as token_one
    pub royalty_fee_percentage: Amount,
    /// Treasury recipient, fixed at creation
    pub royalty_fee_wallet: Address,
    pub swap_enabled: bool,
}

// ─── Time-lock ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPosition {
    pub amount: Amount,
    pub locked_at: u64,
    pub unlock_date: u64,
    pub claimed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLock {
    pub account: Address,
    pub token: TokenId,
    pub locking_enabled: bool,
    pub total_locked: Amount,
    pub locks: BTreeMap<Address, LockPosition>,
}
