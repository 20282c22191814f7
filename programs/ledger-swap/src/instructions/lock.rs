use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    context::{require_nonzero, Ctx},
    error::{Error, Result},
    events::Event,
    ledger::BalanceLedger,
    state::{Address, Amount, LockPosition, TimeLock, TokenId},
};

impl TimeLock {
    pub fn new(account: Address, token: TokenId) -> Self {
        Self {
            account,
            token,
            locking_enabled: true,
            total_locked: 0,
            locks: BTreeMap::new(),
        }
    }

    /// Lock `amount` of the caller's tokens until `unlock_date`.
    pub fn lock<L: BalanceLedger>(
        &mut self,
        ctx: &mut Ctx<L>,
        amount: Amount,
        unlock_date: u64,
    ) -> Result<()> {
        if !self.locking_enabled {
            return Err(Error::LockingDisabled);
        }
        require_nonzero(amount)?;
        if unlock_date <= ctx.now {
            return Err(Error::InvalidUnlockDate { unlock_date, now: ctx.now });
        }
        let beneficiary = ctx.caller;
        if self.locks.get(&beneficiary).map(|l| l.amount > 0).unwrap_or(false) {
            return Err(Error::AlreadyLocked(beneficiary));
        }
        ctx.require_balance(&beneficiary, &self.token, amount)?;

        self.total_locked = self
            .total_locked
            .checked_add(amount)
            .ok_or(Error::MathOverflow)?;
        self.locks.insert(
            beneficiary,
            LockPosition { amount, locked_at: ctx.now, unlock_date, claimed: false },
        );
        ctx.emit(Event::Locked { lock: self.account, beneficiary, amount, unlock_date });

        ctx.pull(&self.account, &self.token, amount)?;

        debug!(lock = %self.account, %beneficiary, amount, unlock_date, "locked");
        Ok(())
    }

    /// Release the caller's principal once the unlock date has passed.
    /// The position is zeroed so a new lock can be opened.
    pub fn claim<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>) -> Result<Amount> {
        let beneficiary = ctx.caller;
        let position = match self.locks.get_mut(&beneficiary) {
            Some(p) if p.amount > 0 => p,
            _ => return Err(Error::NothingLocked(beneficiary)),
        };
        if ctx.now < position.unlock_date {
            return Err(Error::StillLocked { unlock_date: position.unlock_date });
        }

        let amount = position.amount;
        position.amount = 0;
        position.claimed = true;
        self.total_locked -= amount;
        ctx.emit(Event::Claimed { lock: self.account, beneficiary, amount });

        ctx.send(&self.account, &beneficiary, &self.token, amount)?;

        debug!(lock = %self.account, %beneficiary, amount, "claimed");
        Ok(amount)
    }

    pub fn set_locking_enabled<L: BalanceLedger>(&mut self, ctx: &mut Ctx<L>, enabled: bool) -> Result<()> {
        ctx.require_admin(&self.account)?;
        self.locking_enabled = enabled;
        ctx.emit(Event::LockingEnabledSet { lock: self.account, enabled });
        Ok(())
    }
}
