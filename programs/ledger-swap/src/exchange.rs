//! The world every instruction runs against.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    context::{require_address, require_nonzero, Ctx},
    error::{Error, Result},
    events::{ComponentKind, Event},
    instructions::{fee_math::pow10, Instruction, Outcome, SwapAmounts},
    ledger::{BalanceLedger, InMemoryLedger},
    roles::{Role, RoleAuthority, RoleRegistry},
    state::{Address, Amount, Pool, StakeLedger, StakePosition, SwapEngine, TimeLock, TokenId},
};

/// Owns the ledger, the role registry and every deployed component.
///
/// [`Exchange::process`] applies one instruction to a draft copy and only
/// replaces the committed state when the whole instruction succeeded, so a
/// failure part-way through a multi-transfer sequence leaves nothing behind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange<L = InMemoryLedger> {
    pub ledger: L,
    pub roles: RoleRegistry,
    pub pools: BTreeMap<Address, Pool>,
    pub stakes: BTreeMap<Address, StakeLedger>,
    pub swaps: BTreeMap<Address, SwapEngine>,
    pub locks: BTreeMap<Address, TimeLock>,
}

/// What a committed instruction produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub caller: Address,
    pub timestamp: u64,
    pub outcome: Outcome,
    /// Events in emission order; empty only for no-op role changes
    pub events: Vec<Event>,
}

impl Exchange {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lookup<'m, T>(map: &'m mut BTreeMap<Address, T>, account: &Address) -> Result<&'m mut T> {
    map.get_mut(account).ok_or(Error::UnknownComponent(*account))
}

fn ensure_vacant<T>(map: &BTreeMap<Address, T>, account: &Address) -> Result<()> {
    if map.contains_key(account) {
        return Err(Error::ComponentExists(*account));
    }
    Ok(())
}

impl<L: BalanceLedger + Clone> Exchange<L> {
    pub fn with_ledger(ledger: L) -> Self {
        Self {
            ledger,
            roles: RoleRegistry::new(),
            pools: BTreeMap::new(),
            stakes: BTreeMap::new(),
            swaps: BTreeMap::new(),
            locks: BTreeMap::new(),
        }
    }

    /// Run `instruction` as `caller` at time `now`, all or nothing.
    pub fn process(&mut self, caller: Address, now: u64, instruction: &Instruction) -> Result<Receipt> {
        let mut draft = self.clone();
        let mut events = Vec::new();
        match draft.apply(caller, now, instruction, &mut events) {
            Ok(outcome) => {
                *self = draft;
                debug!(instruction = instruction.name(), %caller, now, events = events.len(), "committed");
                Ok(Receipt { caller, timestamp: now, outcome, events })
            }
            Err(err) => {
                warn!(instruction = instruction.name(), %caller, now, %err, "rejected");
                Err(err)
            }
        }
    }

    fn apply(
        &mut self,
        caller: Address,
        now: u64,
        instruction: &Instruction,
        events: &mut Vec<Event>,
    ) -> Result<Outcome> {
        let Exchange { ledger, roles, pools, stakes, swaps, locks } = self;

        match instruction {
            // ── Ledger ───────────────────────────────────────────────────────
            Instruction::Approve { spender, token, amount } => {
                require_address(spender)?;
                ledger.approve(&caller, spender, token, *amount);
                events.push(Event::Approval {
                    owner: caller,
                    spender: *spender,
                    token: *token,
                    amount: *amount,
                });
                Ok(Outcome::Done)
            }
            Instruction::Transfer { to, token, amount } => {
                require_address(to)?;
                require_nonzero(*amount)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                ctx.require_balance(&caller, token, *amount)?;
                ctx.send(&caller, to, token, *amount)?;
                ctx.emit(Event::Transfer { from: caller, to: *to, token: *token, amount: *amount });
                Ok(Outcome::Done)
            }

            // ── Roles ────────────────────────────────────────────────────────
            Instruction::GrantRole { scope, role, account } => {
                let changed = roles.grant_role(scope, &caller, *role, account)?;
                if changed {
                    events.push(Event::RoleGranted {
                        scope: *scope,
                        role: *role,
                        account: *account,
                        sender: caller,
                    });
                }
                Ok(Outcome::RoleChanged { changed })
            }
            Instruction::RevokeRole { scope, role, account } => {
                let changed = roles.revoke_role(scope, &caller, *role, account)?;
                if changed {
                    events.push(Event::RoleRevoked {
                        scope: *scope,
                        role: *role,
                        account: *account,
                        sender: caller,
                    });
                }
                Ok(Outcome::RoleChanged { changed })
            }
            Instruction::RenounceRole { scope, role } => {
                let changed = roles.renounce_role(scope, &caller, *role);
                if changed {
                    events.push(Event::RoleRevoked {
                        scope: *scope,
                        role: *role,
                        account: caller,
                        sender: caller,
                    });
                }
                Ok(Outcome::RoleChanged { changed })
            }

            // ── Deployment ───────────────────────────────────────────────────
            Instruction::CreatePool { label, token } => {
                require_address(token)?;
                let account = Address::pool(label);
                ensure_vacant(pools, &account)?;
                roles.setup_root(&account, &caller);
                pools.insert(account, Pool::new(account, *token));
                events.push(Event::ComponentCreated { kind: ComponentKind::Pool, account, admin: caller });
                Ok(Outcome::Created { account })
            }
            Instruction::CreateStake { label, token, decimals, interest_rate } => {
                require_address(token)?;
                pow10(*decimals)?;
                let account = Address::stake(label);
                ensure_vacant(stakes, &account)?;
                roles.setup_root(&account, &caller);
                stakes.insert(account, StakeLedger::new(account, *token, *decimals, *interest_rate));
                events.push(Event::ComponentCreated { kind: ComponentKind::Stake, account, admin: caller });
                Ok(Outcome::Created { account })
            }
            Instruction::CreateSwap { label, royalty_fee_wallet, royalty_fee_percentage } => {
                require_address(royalty_fee_wallet)?;
                let account = Address::swap(label);
                ensure_vacant(swaps, &account)?;
                roles.setup_root(&account, &caller);
                swaps.insert(
                    account,
                    SwapEngine::new(account, *royalty_fee_wallet, *royalty_fee_percentage),
                );
                events.push(Event::ComponentCreated { kind: ComponentKind::Swap, account, admin: caller });
                Ok(Outcome::Created { account })
            }
            Instruction::CreateLock { label, token } => {
                require_address(token)?;
                let account = Address::lock(label);
                ensure_vacant(locks, &account)?;
                roles.setup_root(&account, &caller);
                locks.insert(account, TimeLock::new(account, *token));
                events.push(Event::ComponentCreated { kind: ComponentKind::Lock, account, admin: caller });
                Ok(Outcome::Created { account })
            }

            // ── Pool ─────────────────────────────────────────────────────────
            Instruction::Deposit { pool, amount } => {
                let pool = lookup(pools, pool)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                pool.deposit(&mut ctx, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::Withdraw { pool, receiver, amount } => {
                let pool = lookup(pools, pool)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                pool.withdraw(&mut ctx, *receiver, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::WithdrawNativeTokens { pool, receiver, amount } => {
                let pool = lookup(pools, pool)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                pool.withdraw_native_tokens(&mut ctx, *receiver, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::WithdrawTokens { pool, token, receiver, amount } => {
                let pool = lookup(pools, pool)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                pool.withdraw_tokens(&mut ctx, *token, *receiver, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::SetDepositingEnabled { pool, enabled } => {
                let pool = lookup(pools, pool)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                pool.set_depositing_enabled(&mut ctx, *enabled)?;
                Ok(Outcome::Done)
            }

            // ── Stake ────────────────────────────────────────────────────────
            Instruction::DepositRewardTokens { stake, amount } => {
                let stake = lookup(stakes, stake)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                stake.deposit_reward_tokens(&mut ctx, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::Stake { stake, amount } => {
                let stake = lookup(stakes, stake)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                stake.stake(&mut ctx, *amount)?;
                Ok(Outcome::Done)
            }
            Instruction::Unstake { stake } => {
                let stake = lookup(stakes, stake)?;
                let amount = stake.position(&caller).map(|p| p.amount).unwrap_or(0);
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                let reward = stake.unstake(&mut ctx)?;
                Ok(Outcome::Unstaked { amount, reward })
            }
            Instruction::SetInterestRate { stake, interest_rate } => {
                let stake = lookup(stakes, stake)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                stake.set_interest_rate(&mut ctx, *interest_rate)?;
                Ok(Outcome::Done)
            }
            Instruction::SetStakingEnabled { stake, enabled } => {
                let stake = lookup(stakes, stake)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                stake.set_staking_enabled(&mut ctx, *enabled)?;
                Ok(Outcome::Done)
            }
            Instruction::SetUnstakingEnabled { stake, enabled } => {
                let stake = lookup(stakes, stake)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                stake.set_unstaking_enabled(&mut ctx, *enabled)?;
                Ok(Outcome::Done)
            }

            // ── Swap ─────────────────────────────────────────────────────────
            Instruction::SwapTokens { swap, token_one, token_one_decimals, token_two, token_one_amount } => {
                let engine = lookup(swaps, swap)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                let amounts = engine.swap_tokens(
                    &mut ctx,
                    pools,
                    *token_one,
                    *token_one_decimals,
                    *token_two,
                    *token_one_amount,
                )?;
                Ok(Outcome::Swapped(amounts))
            }
            Instruction::SetTokenPoolAddress { swap, token, pool } => {
                let engine = lookup(swaps, swap)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                engine.set_token_pool_address(&mut ctx, pools, *token, *pool)?;
                Ok(Outcome::Done)
            }
            Instruction::SetTokenRatio { swap, token_one, token_two, ratio } => {
                let engine = lookup(swaps, swap)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                engine.set_token_ratio(&mut ctx, *token_one, *token_two, *ratio)?;
                Ok(Outcome::Done)
            }
            Instruction::SetRoyaltyFeePercentage { swap, percentage } => {
                let engine = lookup(swaps, swap)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                engine.set_royalty_fee_percentage(&mut ctx, *percentage)?;
                Ok(Outcome::Done)
            }
            Instruction::SetSwapEnabled { swap, enabled } => {
                let engine = lookup(swaps, swap)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                engine.set_swap_enabled(&mut ctx, *enabled)?;
                Ok(Outcome::Done)
            }

            // ── Time-lock ────────────────────────────────────────────────────
            Instruction::Lock { lock, amount, unlock_date } => {
                let lock = lookup(locks, lock)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                lock.lock(&mut ctx, *amount, *unlock_date)?;
                Ok(Outcome::Done)
            }
            Instruction::Claim { lock } => {
                let lock = lookup(locks, lock)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                let amount = lock.claim(&mut ctx)?;
                Ok(Outcome::Claimed { amount })
            }
            Instruction::SetLockingEnabled { lock, enabled } => {
                let lock = lookup(locks, lock)?;
                let mut ctx = Ctx::new(ledger, roles, events, caller, now);
                lock.set_locking_enabled(&mut ctx, *enabled)?;
                Ok(Outcome::Done)
            }
        }
    }

    // ─── Views ───────────────────────────────────────────────────────────────
    // Lookups never fail; unknown components read as empty.

    pub fn balance_of(&self, account: &Address, token: &TokenId) -> Amount {
        self.ledger.balance_of(account, token)
    }

    pub fn has_role(&self, scope: &Address, role: Role, account: &Address) -> bool {
        self.roles.has_role(scope, role, account)
    }

    pub fn pool(&self, account: &Address) -> Option<&Pool> {
        self.pools.get(account)
    }

    pub fn stake_ledger(&self, account: &Address) -> Option<&StakeLedger> {
        self.stakes.get(account)
    }

    pub fn stake_position(&self, stake: &Address, staker: &Address) -> Option<&StakePosition> {
        self.stakes.get(stake).and_then(|s| s.position(staker))
    }

    pub fn swap_engine(&self, account: &Address) -> Option<&SwapEngine> {
        self.swaps.get(account)
    }

    pub fn time_lock(&self, account: &Address) -> Option<&TimeLock> {
        self.locks.get(account)
    }

    pub fn get_token_ratio(&self, swap: &Address, token_one: &TokenId, token_two: &TokenId) -> Amount {
        self.swaps
            .get(swap)
            .map(|s| s.get_token_ratio(token_one, token_two))
            .unwrap_or(0)
    }

    pub fn get_token_pool_address(&self, swap: &Address, token: &TokenId) -> Option<Address> {
        self.swaps.get(swap).and_then(|s| s.get_token_pool_address(token))
    }

    /// Off-chain preview of a swap at the current configuration.
    pub fn quote_swap(
        &self,
        swap: &Address,
        token_one: &TokenId,
        token_one_decimals: u8,
        token_two: &TokenId,
        token_one_amount: Amount,
    ) -> Result<SwapAmounts> {
        let engine = self.swaps.get(swap).ok_or(Error::UnknownComponent(*swap))?;
        if token_one == token_two {
            return Err(Error::IdenticalTokens);
        }
        engine.quote(token_one, token_one_decimals, token_two, token_one_amount)
    }

    /// Every pool counter matches its ledger balance.
    pub fn pools_consistent(&self) -> bool {
        self.pools.values().all(|p| p.is_consistent(&self.ledger))
    }
}
