pub mod fee_math;
pub mod lock;
pub mod pool;
pub mod stake;
pub mod swap;

pub use fee_math::*;

use serde::{Deserialize, Serialize};

use crate::roles::Role;
use crate::state::{Address, Amount, TokenId};

/// Every state-changing operation the [`Exchange`](crate::Exchange) accepts.
/// Each one runs as a single atomic transaction on behalf of a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    // ── Ledger ───────────────────────────────────────────────────────────────
    Approve { spender: Address, token: TokenId, amount: Amount },
    Transfer { to: Address, token: TokenId, amount: Amount },

    // ── Roles ────────────────────────────────────────────────────────────────
    GrantRole { scope: Address, role: Role, account: Address },
    RevokeRole { scope: Address, role: Role, account: Address },
    RenounceRole { scope: Address, role: Role },

    // ── Deployment ───────────────────────────────────────────────────────────
    CreatePool { label: String, token: TokenId },
    CreateStake { label: String, token: TokenId, decimals: u8, interest_rate: Amount },
    CreateSwap { label: String, royalty_fee_wallet: Address, royalty_fee_percentage: Amount },
    CreateLock { label: String, token: TokenId },

    // ── Pool ─────────────────────────────────────────────────────────────────
    Deposit { pool: Address, amount: Amount },
    Withdraw { pool: Address, receiver: Address, amount: Amount },
    WithdrawNativeTokens { pool: Address, receiver: Address, amount: Amount },
    WithdrawTokens { pool: Address, token: TokenId, receiver: Address, amount: Amount },
    SetDepositingEnabled { pool: Address, enabled: bool },

    // ── Stake ────────────────────────────────────────────────────────────────
    DepositRewardTokens { stake: Address, amount: Amount },
    Stake { stake: Address, amount: Amount },
    Unstake { stake: Address },
    SetInterestRate { stake: Address, interest_rate: Amount },
    SetStakingEnabled { stake: Address, enabled: bool },
    SetUnstakingEnabled { stake: Address, enabled: bool },

    // ── Swap ─────────────────────────────────────────────────────────────────
    SwapTokens {
        swap: Address,
        token_one: TokenId,
        token_one_decimals: u8,
        token_two: TokenId,
        token_one_amount: Amount,
    },
    SetTokenPoolAddress { swap: Address, token: TokenId, pool: Address },
    SetTokenRatio { swap: Address, token_one: TokenId, token_two: TokenId, ratio: Amount },
    SetRoyaltyFeePercentage { swap: Address, percentage: Amount },
    SetSwapEnabled { swap: Address, enabled: bool },

    // ── Time-lock ────────────────────────────────────────────────────────────
    Lock { lock: Address, amount: Amount, unlock_date: u64 },
    Claim { lock: Address },
    SetLockingEnabled { lock: Address, enabled: bool },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Approve { .. } => "approve",
            Instruction::Transfer { .. } => "transfer",
            Instruction::GrantRole { .. } => "grant_role",
            Instruction::RevokeRole { .. } => "revoke_role",
            Instruction::RenounceRole { .. } => "renounce_role",
            Instruction::CreatePool { .. } => "create_pool",
            Instruction::CreateStake { .. } => "create_stake",
            Instruction::CreateSwap { .. } => "create_swap",
            Instruction::CreateLock { .. } => "create_lock",
            Instruction::Deposit { .. } => "deposit",
            Instruction::Withdraw { .. } => "withdraw",
            Instruction::WithdrawNativeTokens { .. } => "withdraw_native_tokens",
            Instruction::WithdrawTokens { .. } => "withdraw_tokens",
            Instruction::SetDepositingEnabled { .. } => "set_depositing_enabled",
            Instruction::DepositRewardTokens { .. } => "deposit_reward_tokens",
            Instruction::Stake { .. } => "stake",
            Instruction::Unstake { .. } => "unstake",
            Instruction::SetInterestRate { .. } => "set_interest_rate",
            Instruction::SetStakingEnabled { .. } => "set_staking_enabled",
            Instruction::SetUnstakingEnabled { .. } => "set_unstaking_enabled",
            Instruction::SwapTokens { .. } => "swap_tokens",
            Instruction::SetTokenPoolAddress { .. } => "set_token_pool_address",
            Instruction::SetTokenRatio { .. } => "set_token_ratio",
            Instruction::SetRoyaltyFeePercentage { .. } => "set_royalty_fee_percentage",
            Instruction::SetSwapEnabled { .. } => "set_swap_enabled",
            Instruction::Lock { .. } => "lock",
            Instruction::Claim { .. } => "claim",
            Instruction::SetLockingEnabled { .. } => "set_locking_enabled",
        }
    }
}

/// Result payload of a committed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Created { account: Address },
    RoleChanged { changed: bool },
    Swapped(SwapAmounts),
    Unstaked { amount: Amount, reward: Amount },
    Claimed { amount: Amount },
}
