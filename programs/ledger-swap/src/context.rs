use crate::{
    error::{Error, Result},
    events::Event,
    ledger::BalanceLedger,
    roles::{Role, RoleAuthority, RoleRegistry},
    state::{Address, Amount, TokenId},
};

/// Everything a handler may touch while an instruction runs: the ledger, the
/// role registry (read-only), the event buffer, the acting caller and the
/// transaction timestamp.
pub struct Ctx<'a, L: BalanceLedger> {
    pub ledger: &'a mut L,
    pub roles: &'a RoleRegistry,
    pub events: &'a mut Vec<Event>,
    pub caller: Address,
    pub now: u64,
}

impl<'a, L: BalanceLedger> Ctx<'a, L> {
    pub fn new(
        ledger: &'a mut L,
        roles: &'a RoleRegistry,
        events: &'a mut Vec<Event>,
        caller: Address,
        now: u64,
    ) -> Self {
        Self { ledger, roles, events, caller, now }
    }

    /// Reborrow with a different caller, used when a component acts on
    /// another one (the swap engine depositing into a pool).
    pub fn acting_as(&mut self, caller: Address) -> Ctx<'_, L> {
        Ctx {
            ledger: &mut *self.ledger,
            roles: self.roles,
            events: &mut *self.events,
            caller,
            now: self.now,
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Caller must hold at least one of `roles` on `scope`.
    pub fn require_any(&self, scope: &Address, roles: &[Role]) -> Result<()> {
        self.roles.require_any(scope, roles, &self.caller)
    }

    pub fn require_admin(&self, scope: &Address) -> Result<()> {
        self.roles.require_role(scope, Role::Admin, &self.caller)
    }

    pub fn require_balance(&self, account: &Address, token: &TokenId, need: Amount) -> Result<()> {
        let have = self.ledger.balance_of(account, token);
        if have < need {
            return Err(Error::InsufficientBalance {
                account: *account,
                token: *token,
                have,
                need,
            });
        }
        Ok(())
    }

    /// Pull `amount` from the caller into `custodian`, which spends the
    /// caller's allowance.
    pub fn pull(&mut self, custodian: &Address, token: &TokenId, amount: Amount) -> Result<()> {
        let from = self.caller;
        require_distinct(&from, custodian)?;
        if !self.ledger.transfer_from(custodian, &from, custodian, token, amount) {
            return Err(Error::TransferFailed { from, to: *custodian, token: *token, amount });
        }
        Ok(())
    }

    /// Transfer out of an account the running component controls.
    pub fn send(&mut self, from: &Address, to: &Address, token: &TokenId, amount: Amount) -> Result<()> {
        require_distinct(from, to)?;
        if !self.ledger.transfer(from, to, token, amount) {
            return Err(Error::TransferFailed { from: *from, to: *to, token: *token, amount });
        }
        Ok(())
    }
}

pub(crate) fn require_nonzero(amount: Amount) -> Result<()> {
    if amount == 0 {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// A custodial account paying itself would move its counters but not the
/// ledger.
pub(crate) fn require_distinct(from: &Address, to: &Address) -> Result<()> {
    if from == to {
        return Err(Error::SelfTransfer(*from));
    }
    Ok(())
}

pub(crate) fn require_address(address: &Address) -> Result<()> {
    if address.is_zero() {
        return Err(Error::ZeroAddress);
    }
    Ok(())
}
