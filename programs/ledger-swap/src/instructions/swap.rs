use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::{
    constants::UNLIMITED_ALLOWANCE,
    context::{require_address, require_nonzero, Ctx},
    error::{Error, Result},
    events::Event,
    instructions::fee_math::{compute_swap, SwapAmounts},
    ledger::BalanceLedger,
    state::{Address, Amount, Pool, SwapEngine, TokenId},
};

impl SwapEngine {
    pub fn new(account: Address, royalty_fee_wallet: Address, royalty_fee_percentage: Amount) -> Self {
        Self {
            account,
            token_pools: BTreeMap::new(),
            token_ratios: BTreeMap::new(),
            royalty_fee_percentage,
            royalty_fee_wallet,
            swap_enabled: true,
        }
    }

    /// Directional ratio, zero when unset.
    pub fn get_token_ratio(&self, token_one: &TokenId, token_two: &TokenId) -> Amount {
        self.token_ratios
            .get(token_one)
            .and_then(|row| row.get(token_two))
            .copied()
            .unwrap_or(0)
    }

    pub fn get_token_pool_address(&self, token: &TokenId) -> Option<Address> {
        self.token_pools.get(token).copied()
    }

    /// Amounts a swap would produce at the current configuration.
    pub fn quote(
        &self,
        token_one: &TokenId,
        token_one_decimals: u8,
        token_two: &TokenId,
        token_one_amount: Amount,
    ) -> Result<SwapAmounts> {
        compute_swap(
            token_one_amount,
            self.get_token_ratio(token_one, token_two),
            self.royalty_fee_percentage,
            token_one_decimals,
        )
    }

    /// Exchange `token_one_amount` of `token_one` for `token_two`.
    ///
    /// Flow:
    ///   1. caller → engine          : token_one_amount (pulled, engine is spender)
    ///   2. engine → pool one        : token_one_amount − fee, via `Pool::deposit`
    ///   3. engine → royalty wallet  : fee, in token_one
    ///   4. pool two → caller        : net token_two, via `Pool::withdraw`
    ///
    /// The engine must hold `Depositor` on pool one and `Withdrawer` on pool two.
    pub fn swap_tokens<L: BalanceLedger>(
        &self,
        ctx: &mut Ctx<L>,
        pools: &mut BTreeMap<Address, Pool>,
        token_one: TokenId,
        token_one_decimals: u8,
        token_two: TokenId,
        token_one_amount: Amount,
    ) -> Result<SwapAmounts> {
        if !self.swap_enabled {
            return Err(Error::SwapDisabled);
        }
        if token_one == token_two {
            return Err(Error::IdenticalTokens);
        }
        require_nonzero(token_one_amount)?;
        let caller = ctx.caller;
        ctx.require_balance(&caller, &token_one, token_one_amount)?;

        let amounts = self.quote(&token_one, token_one_decimals, &token_two, token_one_amount)?;
        if amounts.net_two_amount == 0 {
            return Err(Error::ZeroOutput);
        }

        let pool_one = self
            .get_token_pool_address(&token_one)
            .ok_or(Error::UnknownTokenPool(token_one))?;
        let pool_two = self
            .get_token_pool_address(&token_two)
            .ok_or(Error::UnknownTokenPool(token_two))?;

        // Payout custody: token_two held by the token_two pool.
        let available = ctx.ledger.balance_of(&pool_two, &token_two);
        if available < amounts.net_two_amount {
            return Err(Error::InsufficientPoolBalance {
                pool: pool_two,
                have: available,
                need: amounts.net_two_amount,
            });
        }

        // ── 1. Caller → engine custody ───────────────────────────────────────
        ctx.pull(&self.account, &token_one, token_one_amount)?;

        // ── 2. Engine → token_one pool ───────────────────────────────────────
        {
            let pool = pools.get_mut(&pool_one).ok_or(Error::UnknownComponent(pool_one))?;
            let mut engine = ctx.acting_as(self.account);
            pool.deposit(&mut engine, amounts.pool_deposit)?;
        }

        // ── 3. Royalty skim → treasury ───────────────────────────────────────
        ctx.send(&self.account, &self.royalty_fee_wallet, &token_one, amounts.fee)?;

        // ── 4. token_two pool → caller ───────────────────────────────────────
        {
            let pool = pools.get_mut(&pool_two).ok_or(Error::UnknownComponent(pool_two))?;
            let mut engine = ctx.acting_as(self.account);
            pool.withdraw(&mut engine, caller, amounts.net_two_amount)?;
        }

        ctx.emit(Event::TokensSwapped {
            swap: self.account,
            caller,
            timestamp: ctx.now,
            token_one,
            token_two,
            token_one_amount,
            token_two_amount: amounts.net_two_amount,
            fee: amounts.fee,
        });

        info!(
            swap = %self.account, %caller, %token_one, %token_two,
            amount_in = token_one_amount, fee = amounts.fee, out = amounts.net_two_amount,
            "swap"
        );
        Ok(amounts)
    }

    /// Register the pool custodying `token` and let it pull the engine's
    /// `token` balance without limit.
    pub fn set_token_pool_address<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        pools: &BTreeMap<Address, Pool>,
        token: TokenId,
        pool: Address,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        require_address(&token)?;
        let managed = pools.get(&pool).ok_or(Error::UnknownComponent(pool))?.token;
        if managed != token {
            return Err(Error::PoolTokenMismatch { pool, expected: token, actual: managed });
        }

        self.token_pools.insert(token, pool);
        ctx.ledger.approve(&self.account, &pool, &token, UNLIMITED_ALLOWANCE);
        ctx.emit(Event::TokenPoolSet { swap: self.account, token, pool });
        debug!(swap = %self.account, %token, %pool, "token pool set");
        Ok(())
    }

    pub fn set_token_ratio<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        token_one: TokenId,
        token_two: TokenId,
        ratio: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.token_ratios.entry(token_one).or_default().insert(token_two, ratio);
        ctx.emit(Event::TokenRatioSet { swap: self.account, token_one, token_two, ratio });
        Ok(())
    }

    pub fn set_royalty_fee_percentage<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        percentage: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.royalty_fee_percentage = percentage;
        ctx.emit(Event::RoyaltyFeePercentageSet { swap: self.account, percentage });
        Ok(())
    }

    pub fn set_swap_enabled<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>, enabled: bool) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.swap_enabled = enabled;
        ctx.emit(Event::SwapEnabledSet { swap: self.account, enabled });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ledger::InMemoryLedger, roles::{Role, RoleRegistry}};

    const DECIMALS: u8 = 6;

    struct Fixture {
        ledger: InMemoryLedger,
        roles: RoleRegistry,
        events: Vec<Event>,
        pools: BTreeMap<Address, Pool>,
        engine: SwapEngine,
        admin: Address,
        trader: Address,
        treasury: Address,
        one: TokenId,
        two: TokenId,
    }

    fn fixture() -> Fixture {
        let admin = Address::from_label("admin");
        let trader = Address::from_label("trader");
        let treasury = Address::from_label("treasury");
        let one = Address::token("ONE");
        let two = Address::token("TWO");

        let mut engine = SwapEngine::new(Address::swap("main"), treasury, 500_000);
        let pool_one = Pool::new(Address::pool("one"), one);
        let mut pool_two = Pool::new(Address::pool("two"), two);

        let mut roles = RoleRegistry::new();
        let mut ledger = InMemoryLedger::new();
        for scope in [engine.account, pool_one.account, pool_two.account] {
            roles.setup_root(&scope, &admin);
        }
        roles.grant_role(&pool_one.account, &admin, Role::Depositor, &engine.account).unwrap();
        roles.grant_role(&pool_two.account, &admin, Role::Withdrawer, &engine.account).unwrap();

        ledger.mint(&trader, &one, 10_000_000_000);
        ledger.approve(&trader, &engine.account, &one, UNLIMITED_ALLOWANCE);
        // seed pool two with payout liquidity
        ledger.mint(&pool_two.account, &two, 50_000_000_000);
        pool_two.pool_balance = 50_000_000_000;

        let mut pools = BTreeMap::new();
        pools.insert(pool_one.account, pool_one);
        pools.insert(pool_two.account, pool_two);

        let mut events = Vec::new();
        let mut ctx = Ctx::new(&mut ledger, &roles, &mut events, admin, 0);
        engine.set_token_pool_address(&mut ctx, &pools, one, Address::pool("one")).unwrap();
        engine.set_token_pool_address(&mut ctx, &pools, two, Address::pool("two")).unwrap();
        engine.set_token_ratio(&mut ctx, one, two, 2_000_000).unwrap();
        events.clear();

        Fixture { ledger, roles, events, pools, engine, admin, trader, treasury, one, two }
    }

    #[test]
    fn swap_skims_royalty_and_pays_net() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.trader, 42);
        let amounts = f
            .engine
            .swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.two, 10_000_000_000)
            .unwrap();

        assert_eq!(amounts.net_two_amount, 19_900_000_000);
        assert_eq!(amounts.fee, 100_000_000);
        assert_eq!(f.ledger.balance_of(&f.trader, &f.one), 0);
        assert_eq!(f.ledger.balance_of(&f.trader, &f.two), 19_900_000_000);
        assert_eq!(f.ledger.balance_of(&f.treasury, &f.one), 100_000_000);
        assert_eq!(f.ledger.balance_of(&f.engine.account, &f.one), 0);

        let pool_one = &f.pools[&Address::pool("one")];
        assert_eq!(pool_one.pool_balance, 9_900_000_000);
        assert!(pool_one.is_consistent(&f.ledger));
        assert!(f.pools[&Address::pool("two")].is_consistent(&f.ledger));

        assert_eq!(
            f.events.last(),
            Some(&Event::TokensSwapped {
                swap: f.engine.account,
                caller: f.trader,
                timestamp: 42,
                token_one: f.one,
                token_two: f.two,
                token_one_amount: 10_000_000_000,
                token_two_amount: 19_900_000_000,
                fee: 100_000_000,
            })
        );
    }

    #[test]
    fn preconditions_are_checked_in_order() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.trader, 1);

        assert_eq!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.one, 0),
            Err(Error::IdenticalTokens)
        );
        assert_eq!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.two, 0),
            Err(Error::ZeroAmount)
        );
        assert!(matches!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.two, 10_000_000_001),
            Err(Error::InsufficientBalance { .. })
        ));

        f.engine.swap_enabled = false;
        assert_eq!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.one, 0),
            Err(Error::SwapDisabled)
        );
    }

    #[test]
    fn reverse_direction_needs_its_own_ratio() {
        let mut f = fixture();
        f.ledger.mint(&f.trader, &f.two, 1_000);
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.trader, 1);
        assert_eq!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.two, DECIMALS, f.one, 1_000),
            Err(Error::ZeroOutput)
        );
        assert_eq!(f.engine.get_token_ratio(&f.two, &f.one), 0);
    }

    #[test]
    fn payout_pool_must_cover_net_amount() {
        let mut f = fixture();
        f.ledger.mint(&f.trader, &f.one, 30_000_000_000);
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.trader, 1);
        let err = f
            .engine
            .swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, f.two, 40_000_000_000)
            .unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientPoolBalance {
                pool: Address::pool("two"),
                have: 50_000_000_000,
                need: 79_600_000_000,
            }
        );
    }

    #[test]
    fn unregistered_pool_is_rejected() {
        let mut f = fixture();
        let three = Address::token("THREE");
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.admin, 1);
        f.engine.set_token_ratio(&mut ctx, f.one, three, 1_000_000).unwrap();
        let mut ctx = ctx.acting_as(f.trader);
        assert_eq!(
            f.engine.swap_tokens(&mut ctx, &mut f.pools, f.one, DECIMALS, three, 1_000),
            Err(Error::UnknownTokenPool(three))
        );
    }

    #[test]
    fn pool_registration_checks_managed_token() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.admin, 1);
        let err = f
            .engine
            .set_token_pool_address(&mut ctx, &f.pools, f.one, Address::pool("two"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::PoolTokenMismatch { pool: Address::pool("two"), expected: f.one, actual: f.two }
        );
        assert_eq!(
            f.ledger.allowance(&f.engine.account, &Address::pool("one"), &f.one),
            UNLIMITED_ALLOWANCE
        );
    }

    #[test]
    fn setters_are_admin_only() {
        let mut f = fixture();
        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.trader, 1);
        assert!(f.engine.set_royalty_fee_percentage(&mut ctx, 1).is_err());
        assert!(f.engine.set_token_ratio(&mut ctx, f.one, f.two, 1).is_err());
        assert!(f.engine.set_swap_enabled(&mut ctx, false).is_err());
        assert!(f.events.is_empty());

        let mut ctx = Ctx::new(&mut f.ledger, &f.roles, &mut f.events, f.admin, 1);
        f.engine.set_royalty_fee_percentage(&mut ctx, 1).unwrap();
        assert_eq!(
            f.events,
            vec![Event::RoyaltyFeePercentageSet { swap: f.engine.account, percentage: 1 }]
        );
    }
}
