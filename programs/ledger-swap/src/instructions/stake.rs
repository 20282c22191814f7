use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
    context::{require_nonzero, Ctx},
    error::{Error, Result},
    events::Event,
    instructions::fee_math::stake_reward,
    ledger::BalanceLedger,
    state::{Address, Amount, StakeLedger, StakePosition, TokenId},
};

impl StakeLedger {
    pub fn new(account: Address, token: TokenId, decimals: u8, interest_rate: Amount) -> Self {
        Self {
            account,
            token,
            decimals,
            interest_rate,
            staking_enabled: true,
            unstaking_enabled: true,
            total_staker_count: 0,
            total_staked_token_amount: 0,
            reward_token_pool_balance: 0,
            positions: BTreeMap::new(),
        }
    }

    pub fn position(&self, staker: &Address) -> Option<&StakePosition> {
        self.positions.get(staker)
    }

    /// Fund the shared reward pool.
    pub fn deposit_reward_tokens<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        amount: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        require_nonzero(amount)?;
        let depositor = ctx.caller;
        ctx.require_balance(&depositor, &self.token, amount)?;

        self.reward_token_pool_balance = self
            .reward_token_pool_balance
            .checked_add(amount)
            .ok_or(Error::MathOverflow)?;
        ctx.emit(Event::RewardTokensDeposited { stake: self.account, depositor, amount });

        ctx.pull(&self.account, &self.token, amount)
    }

    /// Open a position at the current interest rate.
    pub fn stake<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>, amount: Amount) -> Result<()> {
        if !self.staking_enabled {
            return Err(Error::StakingDisabled);
        }
        require_nonzero(amount)?;
        let staker = ctx.caller;
        // only the flag guards re-entry; a closed position keeps its amount
        if self.positions.get(&staker).map(|p| p.staked).unwrap_or(false) {
            return Err(Error::AlreadyStaked(staker));
        }
        ctx.require_balance(&staker, &self.token, amount)?;

        self.total_staker_count = self
            .total_staker_count
            .checked_add(1)
            .ok_or(Error::MathOverflow)?;
        self.total_staked_token_amount = self
            .total_staked_token_amount
            .checked_add(amount)
            .ok_or(Error::MathOverflow)?;
        let position = StakePosition {
            date: ctx.now,
            interest_rate: self.interest_rate,
            amount,
            staked: true,
        };
        self.positions.insert(staker, position);
        ctx.emit(Event::Staked {
            stake: self.account,
            staker,
            amount,
            interest_rate: self.interest_rate,
            date: ctx.now,
        });

        ctx.pull(&self.account, &self.token, amount)?;

        info!(stake = %self.account, %staker, amount, rate = self.interest_rate, "staked");
        Ok(())
    }

    /// Close the caller's position, paying principal then reward.
    /// Returns the reward.
    pub fn unstake<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>) -> Result<Amount> {
        if !self.unstaking_enabled {
            return Err(Error::UnstakingDisabled);
        }
        let staker = ctx.caller;
        let position = match self.positions.get(&staker) {
            Some(p) if p.staked && p.amount > 0 => p.clone(),
            _ => return Err(Error::NotStaked(staker)),
        };
        let amount = position.amount;

        let held = ctx.ledger.balance_of(&self.account, &self.token);
        let have = held.min(self.total_staked_token_amount);
        if have < amount {
            return Err(Error::InsufficientStakedBalance { stake: self.account, have, need: amount });
        }

        let reward = stake_reward(amount, position.interest_rate, self.decimals)?;

        if self.reward_token_pool_balance < reward {
            return Err(Error::InsufficientRewardPool {
                have: self.reward_token_pool_balance,
                need: reward,
            });
        }

        self.total_staker_count = self.total_staker_count.saturating_sub(1);
        self.total_staked_token_amount -= amount;
        self.reward_token_pool_balance -= reward;
        if let Some(p) = self.positions.get_mut(&staker) {
            p.staked = false;
        }
        ctx.emit(Event::Unstaked { stake: self.account, staker, amount, reward });

        ctx.send(&self.account, &staker, &self.token, amount)?;
        ctx.send(&self.account, &staker, &self.token, reward)?;

        info!(stake = %self.account, %staker, amount, reward, "unstaked");
        Ok(reward)
    }

    pub fn set_interest_rate<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        interest_rate: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.interest_rate = interest_rate;
        ctx.emit(Event::InterestRateSet { stake: self.account, interest_rate });
        debug!(stake = %self.account, interest_rate, "interest rate set");
        Ok(())
    }

    pub fn set_staking_enabled<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>, enabled: bool) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.staking_enabled = enabled;
        ctx.emit(Event::StakingEnabledSet { stake: self.account, enabled });
        Ok(())
    }

    pub fn set_unstaking_enabled<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        enabled: bool,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.unstaking_enabled = enabled;
        ctx.emit(Event::UnstakingEnabledSet { stake: self.account, enabled });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::UNLIMITED_ALLOWANCE,
        ledger::InMemoryLedger,
        roles::{Role, RoleRegistry},
    };

    const RATE: Amount = 500_000;

    struct Fixture {
        ledger: InMemoryLedger,
        roles: RoleRegistry,
        events: Vec<Event>,
        stake: StakeLedger,
        admin: Address,
        alice: Address,
    }

    fn fixture() -> Fixture {
        let admin = Address::from_label("admin");
        let alice = Address::from_label("alice");
        let token = Address::token("USDC");
        let stake = StakeLedger::new(Address::stake("main"), token, 6, RATE);

        let mut roles = RoleRegistry::new();
        roles.setup_root(&stake.account, &admin);

        let mut ledger = InMemoryLedger::new();
        for who in [admin, alice] {
            ledger.mint(&who, &token, 1_000_000_000);
            ledger.approve(&who, &stake.account, &token, UNLIMITED_ALLOWANCE);
        }

        let mut f = Fixture { ledger, roles, events: Vec::new(), stake, admin, alice };
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, admin, 0);
        f.stake.deposit_reward_tokens(&mut ctx, 10_000_000).unwrap();
        f.events.clear();
        f
    }

    #[test]
    fn stake_then_unstake_pays_reward() {
        let mut f = fixture();
        let token = f.stake.token;
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 100);
        f.stake.stake(&mut ctx, 100_000_000).unwrap();
        assert_eq!(f.stake.total_staker_count, 1);
        assert_eq!(f.stake.position(&f.alice).unwrap().date, 100);

        let reward = f.stake.unstake(&mut ctx).unwrap();
        assert_eq!(reward, 500_000);
        assert_eq!(f.stake.total_staker_count, 0);
        assert_eq!(f.stake.total_staked_token_amount, 0);
        assert_eq!(f.stake.reward_token_pool_balance, 9_500_000);
        assert_eq!(f.ledger.balance_of(&f.alice, &token), 1_000_500_000);
    }

    #[test]
    fn second_stake_is_rejected() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 10).unwrap();
        assert_eq!(f.stake.stake(&mut ctx, 10), Err(Error::AlreadyStaked(f.alice)));
    }

    #[test]
    fn rate_is_snapshotted_at_entry() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 100_000_000).unwrap();

        let mut admin = ctx.acting_as(f.admin);
        f.stake.set_interest_rate(&mut admin, 5_000_000).unwrap();

        assert_eq!(f.stake.unstake(&mut ctx).unwrap(), 500_000);
    }

    #[test]
    fn unstaked_position_keeps_amount_and_allows_restake() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 1_000).unwrap();
        f.stake.unstake(&mut ctx).unwrap();

        let closed = f.stake.position(&f.alice).unwrap().clone();
        assert!(!closed.staked);
        assert_eq!(closed.amount, 1_000);

        assert_eq!(f.stake.unstake(&mut ctx), Err(Error::NotStaked(f.alice)));
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 2_000).unwrap();
    }

    #[test]
    fn gates_block_both_directions() {
        let mut f = fixture();
        f.stake.staking_enabled = false;
        f.stake.unstaking_enabled = false;
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        assert_eq!(f.stake.stake(&mut ctx, 10), Err(Error::StakingDisabled));
        assert_eq!(f.stake.unstake(&mut ctx), Err(Error::UnstakingDisabled));
    }

    #[test]
    fn reward_pool_shortfall_is_reported() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 1_000_000_000).unwrap();
        f.stake.reward_token_pool_balance = 1;
        assert_eq!(
            f.stake.unstake(&mut ctx),
            Err(Error::InsufficientRewardPool { have: 1, need: 5_000_000 })
        );
    }

    #[test]
    fn reward_deposit_is_admin_only() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        assert!(matches!(
            f.stake.deposit_reward_tokens(&mut ctx, 5),
            Err(Error::Unauthorized { .. })
        ));
        assert!(f.events.is_empty());
    }

    #[test]
    fn setters_are_admin_only_and_emit() {
        let mut f = fixture();
        let stake = f.stake.account;
        let denied = Error::Unauthorized { scope: stake, role: Role::Admin, account: f.alice };

        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        assert_eq!(f.stake.set_interest_rate(&mut ctx, 1), Err(denied.clone()));
        assert_eq!(f.stake.set_staking_enabled(&mut ctx, false), Err(denied.clone()));
        assert_eq!(f.stake.set_unstaking_enabled(&mut ctx, false), Err(denied));
        assert_eq!(f.stake.interest_rate, RATE);
        assert!(f.stake.staking_enabled && f.stake.unstaking_enabled);

        let mut ctx = ctx.acting_as(f.admin);
        f.stake.set_interest_rate(&mut ctx, 700_000).unwrap();
        f.stake.set_staking_enabled(&mut ctx, false).unwrap();
        f.stake.set_unstaking_enabled(&mut ctx, false).unwrap();
        assert_eq!(
            f.events,
            vec![
                Event::InterestRateSet { stake, interest_rate: 700_000 },
                Event::StakingEnabledSet { stake, enabled: false },
                Event::UnstakingEnabledSet { stake, enabled: false },
            ]
        );
        assert_eq!(f.stake.interest_rate, 700_000);
    }

    #[test]
    fn staker_count_overflow_is_reported() {
        let mut f = fixture();
        f.stake.total_staker_count = u64::MAX;
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        assert_eq!(f.stake.stake(&mut ctx, 10), Err(Error::MathOverflow));
    }

    #[test]
    fn staked_counter_shortfall_is_reported() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.alice, 1);
        f.stake.stake(&mut ctx, 1_000).unwrap();
        f.stake.total_staked_token_amount = 400;
        assert_eq!(
            f.stake.unstake(&mut ctx),
            Err(Error::InsufficientStakedBalance { stake: f.stake.account, have: 400, need: 1_000 })
        );
        assert!(f.stake.position(&f.alice).unwrap().staked);
    }
}
