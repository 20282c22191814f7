/// Derivation seeds for component accounts and token denominations
pub const POOL_SEED: &[u8] = b"pool";
pub const STAKE_SEED: &[u8] = b"stake";
pub const SWAP_SEED: &[u8] = b"swap";
pub const LOCK_SEED: &[u8] = b"lock";
pub const TOKEN_SEED: &[u8] = b"token";
pub const ACCOUNT_SEED: &[u8] = b"account";

/// Percentages are expressed as `value / (PERCENT_BASE * 10^decimals)`.
pub const PERCENT_BASE: u128 = 100;

/// Decimals used by the reference token when a config omits them.
pub const DEFAULT_DECIMALS: u8 = 6;

/// Largest decimal exponent `10^d` that still fits in a u128.
pub const MAX_DECIMALS: u8 = 38;

/// Allowance value treated as unbounded by the ledger.
pub const UNLIMITED_ALLOWANCE: u128 = u128::MAX;
