//! Committed state-change notifications.

use serde::{Deserialize, Serialize};

use crate::roles::Role;
use crate::state::{Address, Amount, TokenId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    // ── Ledger / roles ───────────────────────────────────────────────────────
    Approval { owner: Address, spender: Address, token: TokenId, amount: Amount },
    Transfer { from: Address, to: Address, token: TokenId, amount: Amount },
    RoleGranted { scope: Address, role: Role, account: Address, sender: Address },
    RoleRevoked { scope: Address, role: Role, account: Address, sender: Address },
    ComponentCreated { kind: ComponentKind, account: Address, admin: Address },

    // ── Pool ─────────────────────────────────────────────────────────────────
    Deposit { pool: Address, depositor: Address, amount: Amount },
    Withdraw { pool: Address, receiver: Address, amount: Amount },
    NativeTokensWithdrawn { pool: Address, receiver: Address, amount: Amount },
    TokensWithdrawn { pool: Address, token: TokenId, receiver: Address, amount: Amount },
    DepositingEnabledSet { pool: Address, enabled: bool },

    // ── Stake ────────────────────────────────────────────────────────────────
    RewardTokensDeposited { stake: Address, depositor: Address, amount: Amount },
    Staked { stake: Address, staker: Address, amount: Amount, interest_rate: Amount, date: u64 },
    Unstaked { stake: Address, staker: Address, amount: Amount, reward: Amount },
    InterestRateSet { stake: Address, interest_rate: Amount },
    StakingEnabledSet { stake: Address, enabled: bool },
    UnstakingEnabledSet { stake: Address, enabled: bool },

    // ── Swap ─────────────────────────────────────────────────────────────────
    TokensSwapped {
        swap: Address,
        caller: Address,
        timestamp: u64,
        token_one: TokenId,
        token_two: TokenId,
        token_one_amount: Amount,
        token_two_amount: Amount,
        fee: Amount,
    },
    TokenPoolSet { swap: Address, token: TokenId, pool: Address },
    TokenRatioSet { swap: Address, token_one: TokenId, token_two: TokenId, ratio: Amount },
    RoyaltyFeePercentageSet { swap: Address, percentage: Amount },
    SwapEnabledSet { swap: Address, enabled: bool },

    // ── Time-lock ────────────────────────────────────────────────────────────
    Locked { lock: Address, beneficiary: Address, amount: Amount, unlock_date: u64 },
    Claimed { lock: Address, beneficiary: Address, amount: Amount },
    LockingEnabledSet { lock: Address, enabled: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    Pool,
    Stake,
    Swap,
    Lock,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Approval { .. } => "approval",
            Event::Transfer { .. } => "transfer",
            Event::RoleGranted { .. } => "role_granted",
            Event::RoleRevoked { .. } => "role_revoked",
            Event::ComponentCreated { .. } => "component_created",
            Event::Deposit { .. } => "deposit",
            Event::Withdraw { .. } => "withdraw",
            Event::NativeTokensWithdrawn { .. } => "native_tokens_withdrawn",
            Event::TokensWithdrawn { .. } => "tokens_withdrawn",
            Event::DepositingEnabledSet { .. } => "depositing_enabled_set",
            Event::RewardTokensDeposited { .. } => "reward_tokens_deposited",
            Event::Staked { .. } => "staked",
            Event::Unstaked { .. } => "unstaked",
            Event::InterestRateSet { .. } => "interest_rate_set",
            Event::StakingEnabledSet { .. } => "staking_enabled_set",
            Event::UnstakingEnabledSet { .. } => "unstaking_enabled_set",
            Event::TokensSwapped { .. } => "tokens_swapped",
            Event::TokenPoolSet { .. } => "token_pool_set",
            Event::TokenRatioSet { .. } => "token_ratio_set",
            Event::RoyaltyFeePercentageSet { .. } => "royalty_fee_percentage_set",
            Event::SwapEnabledSet { .. } => "swap_enabled_set",
            Event::Locked { .. } => "locked",
            Event::Claimed { .. } => "claimed",
            Event::LockingEnabledSet { .. } => "locking_enabled_set",
        }
    }
}

/// Append-only destination for committed events.
pub trait EventSink {
    fn publish(&mut self, event: &Event);
}

/// Keeps every published event in memory.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn publish(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

/// Forwards events to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&mut self, event: &Event) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        tracing::info!(target: "ledger_swap::events", event = event.name(), %payload);
    }
}
