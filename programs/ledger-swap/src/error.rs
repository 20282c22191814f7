//! Error type shared by every component.

use crate::roles::Role;
use crate::state::{Address, Amount};

/// Coarse classification of [`Error`] values.
///
/// Every error aborts the whole transaction; the kind only tells the caller
/// which condition to correct before resubmitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    StateGate,
    Validation,
    InsufficientBalance,
    TransferFailure,
}

/// All errors returned by the accounting core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    // ── Authorization ────────────────────────────────────────────────────────
    #[error("Account {account} is missing role {role:?} on {scope}")]
    Unauthorized { scope: Address, role: Role, account: Address },

    // ── State gates ──────────────────────────────────────────────────────────
    #[error("Depositing is disabled")]
    DepositingDisabled,

    #[error("Staking is disabled")]
    StakingDisabled,

    #[error("Unstaking is disabled")]
    UnstakingDisabled,

    #[error("Swapping is disabled")]
    SwapDisabled,

    #[error("Locking is disabled")]
    LockingDisabled,

    #[error("Tokens are locked until {unlock_date}")]
    StillLocked { unlock_date: u64 },

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Address must not be the zero address")]
    ZeroAddress,

    #[error("Account {0} cannot transfer to itself")]
    SelfTransfer(Address),

    #[error("Cannot swap a token for itself")]
    IdenticalTokens,

    #[error("Token {0} is managed by this pool and cannot be swept")]
    ManagedTokenSweep(Address),

    #[error("No component deployed at {0}")]
    UnknownComponent(Address),

    #[error("No pool registered for token {0}")]
    UnknownTokenPool(Address),

    #[error("Pool {pool} manages {actual}, not {expected}")]
    PoolTokenMismatch { pool: Address, expected: Address, actual: Address },

    #[error("A component is already deployed at {0}")]
    ComponentExists(Address),

    #[error("Account {0} already has an active stake")]
    AlreadyStaked(Address),

    #[error("Account {0} has no active stake")]
    NotStaked(Address),

    #[error("Account {0} already has an unclaimed lock")]
    AlreadyLocked(Address),

    #[error("Account {0} has nothing locked")]
    NothingLocked(Address),

    #[error("Unlock date {unlock_date} is not after {now}")]
    InvalidUnlockDate { unlock_date: u64, now: u64 },

    #[error("Swap output rounds to zero")]
    ZeroOutput,

    #[error("Integer overflow in fixed-point math")]
    MathOverflow,

    // ── Balances ─────────────────────────────────────────────────────────────
    #[error("Insufficient balance of {token} for {account}: have {have}, need {need}")]
    InsufficientBalance { account: Address, token: Address, have: Amount, need: Amount },

    #[error("Pool {pool} holds {have}, need {need}")]
    InsufficientPoolBalance { pool: Address, have: Amount, need: Amount },

    #[error("Stake {stake} holds {have} staked tokens, need {need}")]
    InsufficientStakedBalance { stake: Address, have: Amount, need: Amount },

    #[error("Reward pool holds {have}, need {need}")]
    InsufficientRewardPool { have: Amount, need: Amount },

    // ── Transfers ────────────────────────────────────────────────────────────
    #[error("Transfer of {amount} {token} from {from} to {to} failed")]
    TransferFailed { from: Address, to: Address, token: Address, amount: Amount },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized { .. } => ErrorKind::Authorization,
            Error::DepositingDisabled
            | Error::StakingDisabled
            | Error::UnstakingDisabled
            | Error::SwapDisabled
            | Error::LockingDisabled
            | Error::StillLocked { .. } => ErrorKind::StateGate,
            Error::InsufficientBalance { .. }
            | Error::InsufficientPoolBalance { .. }
            | Error::InsufficientStakedBalance { .. }
            | Error::InsufficientRewardPool { .. } => ErrorKind::InsufficientBalance,
            Error::TransferFailed { .. } => ErrorKind::TransferFailure,
            _ => ErrorKind::Validation,
        }
    }
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let a = Address::from_label("a");
        assert_eq!(
            Error::Unauthorized { scope: a, role: Role::Admin, account: a }.kind(),
            ErrorKind::Authorization
        );
        assert_eq!(Error::SwapDisabled.kind(), ErrorKind::StateGate);
        assert_eq!(Error::StillLocked { unlock_date: 5 }.kind(), ErrorKind::StateGate);
        assert_eq!(Error::IdenticalTokens.kind(), ErrorKind::Validation);
        assert_eq!(Error::ManagedTokenSweep(a).kind(), ErrorKind::Validation);
        assert_eq!(Error::SelfTransfer(a).kind(), ErrorKind::Validation);
        assert_eq!(
            Error::InsufficientRewardPool { have: 0, need: 1 }.kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            Error::TransferFailed { from: a, to: a, token: a, amount: 1 }.kind(),
            ErrorKind::TransferFailure
        );
    }
}
