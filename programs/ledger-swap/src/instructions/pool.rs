use tracing::debug;

use crate::{
    context::{require_address, require_distinct, require_nonzero, Ctx},
    error::{Error, Result},
    events::Event,
    ledger::BalanceLedger,
    roles::Role,
    state::{Address, Amount, Pool, TokenId},
};

impl Pool {
    pub fn new(account: Address, token: TokenId) -> Self {
        Self {
            account,
            token,
            depositing_enabled: true,
            pool_balance: 0,
        }
    }

    /// Add `amount` of the managed token to the pool.
    ///
    /// The counter is bumped before the tokens are pulled; the caller must
    /// have approved the pool account as spender.
    pub fn deposit<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>, amount: Amount) -> Result<()> {
        ctx.require_any(&self.account, &[Role::Depositor, Role::Admin])?;
        if !self.depositing_enabled {
            return Err(Error::DepositingDisabled);
        }
        require_nonzero(amount)?;
        let depositor = ctx.caller;
        require_distinct(&depositor, &self.account)?;
        ctx.require_balance(&depositor, &self.token, amount)?;

        self.pool_balance = self
            .pool_balance
            .checked_add(amount)
            .ok_or(Error::MathOverflow)?;
        ctx.emit(Event::Deposit { pool: self.account, depositor, amount });

        ctx.pull(&self.account, &self.token, amount)?;

        debug!(pool = %self.account, %depositor, amount, balance = self.pool_balance, "deposit");
        Ok(())
    }

    /// Pay `amount` of the managed token out to `receiver`.
    ///
    /// Checked against both the ledger and the cached counter.
    pub fn withdraw<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        receiver: Address,
        amount: Amount,
    ) -> Result<()> {
        ctx.require_any(&self.account, &[Role::Withdrawer, Role::Admin])?;
        require_address(&receiver)?;
        require_distinct(&self.account, &receiver)?;
        require_nonzero(amount)?;

        let held = ctx.ledger.balance_of(&self.account, &self.token);
        let have = held.min(self.pool_balance);
        if have < amount {
            return Err(Error::InsufficientPoolBalance { pool: self.account, have, need: amount });
        }

        self.pool_balance -= amount;
        ctx.emit(Event::Withdraw { pool: self.account, receiver, amount });

        ctx.send(&self.account, &receiver, &self.token, amount)?;

        debug!(pool = %self.account, %receiver, amount, balance = self.pool_balance, "withdraw");
        Ok(())
    }

    /// Sweep native currency sent to the pool account.
    pub fn withdraw_native_tokens<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        receiver: Address,
        amount: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        require_address(&receiver)?;
        require_nonzero(amount)?;

        let have = ctx.ledger.native_balance_of(&self.account);
        if have < amount {
            return Err(Error::InsufficientBalance {
                account: self.account,
                token: Address::ZERO,
                have,
                need: amount,
            });
        }
        if !ctx.ledger.transfer_native(&self.account, &receiver, amount) {
            return Err(Error::TransferFailed {
                from: self.account,
                to: receiver,
                token: Address::ZERO,
                amount,
            });
        }

        ctx.emit(Event::NativeTokensWithdrawn { pool: self.account, receiver, amount });
        Ok(())
    }

    /// Sweep any denomination other than the managed one.
    pub fn withdraw_tokens<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        token: TokenId,
        receiver: Address,
        amount: Amount,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        if token == self.token {
            return Err(Error::ManagedTokenSweep(token));
        }
        require_address(&receiver)?;
        require_nonzero(amount)?;
        ctx.require_balance(&self.account, &token, amount)?;

        ctx.send(&self.account, &receiver, &token, amount)?;

        ctx.emit(Event::TokensWithdrawn { pool: self.account, token, receiver, amount });
        Ok(())
    }

    pub fn set_depositing_enabled<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        enabled: bool,
    ) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.depositing_enabled = enabled;
        ctx.emit(Event::DepositingEnabledSet { pool: self.account, enabled });
        Ok(())
    }

    /// Whether the cached counter still mirrors the ledger.
    pub fn is_consistent<L: BalanceLedger>(&self, ledger: &L) -> bool {
        ledger.balance_of(&self.account, &self.token) == self.pool_balance
    }
}
