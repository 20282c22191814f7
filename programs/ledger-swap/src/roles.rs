//! Scoped role registry.
//!
//! Grants are keyed by scope (the component account they apply to), role and
//! subject. `Admin` is the root role: it administers itself and every
//! subordinate role.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Root role, administers itself
    Admin,
    Depositor,
    Withdrawer,
    Minter,
}

impl Role {
    /// Role whose holders may grant and revoke `self`.
    pub fn admin_role(self) -> Role {
        Role::Admin
    }
}

/// Read-side of the registry, what handlers check against.
pub trait RoleAuthority {
    fn has_role(&self, scope: &Address, role: Role, subject: &Address) -> bool;

    /// Fail with `Unauthorized` unless `subject` holds at least one of `roles`.
    /// The first role listed is reported on failure.
    fn require_any(&self, scope: &Address, roles: &[Role], subject: &Address) -> Result<()> {
        if roles.iter().any(|role| self.has_role(scope, *role, subject)) {
            return Ok(());
        }
        Err(Error::Unauthorized {
            scope: *scope,
            role: roles.first().copied().unwrap_or(Role::Admin),
            account: *subject,
        })
    }

    fn require_role(&self, scope: &Address, role: Role, subject: &Address) -> Result<()> {
        self.require_any(scope, &[role], subject)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    grants: BTreeMap<Address, BTreeMap<Role, BTreeSet<Address>>>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unchecked root grant, used when a component is deployed.
    pub fn setup_root(&mut self, scope: &Address, subject: &Address) -> bool {
        self.insert(scope, Role::Admin, subject)
    }

    /// Grant `role` to `subject`. Returns whether membership changed.
    pub fn grant_role(
        &mut self,
        scope: &Address,
        caller: &Address,
        role: Role,
        subject: &Address,
    ) -> Result<bool> {
        self.require_role(scope, role.admin_role(), caller)?;
        if subject.is_zero() {
            return Err(Error::ZeroAddress);
        }
        Ok(self.insert(scope, role, subject))
    }

    /// Revoke `role` from `subject`. Returns whether membership changed.
    pub fn revoke_role(
        &mut self,
        scope: &Address,
        caller: &Address,
        role: Role,
        subject: &Address,
    ) -> Result<bool> {
        self.require_role(scope, role.admin_role(), caller)?;
        Ok(self.remove(scope, role, subject))
    }

    /// Drop the caller's own grant.
    pub fn renounce_role(&mut self, scope: &Address, caller: &Address, role: Role) -> bool {
        self.remove(scope, role, caller)
    }

    pub fn members(&self, scope: &Address, role: Role) -> Vec<Address> {
        self.grants
            .get(scope)
            .and_then(|roles| roles.get(&role))
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn insert(&mut self, scope: &Address, role: Role, subject: &Address) -> bool {
        self.grants.entry(*scope).or_default().entry(role).or_default().insert(*subject)
    }

    fn remove(&mut self, scope: &Address, role: Role, subject: &Address) -> bool {
        self.grants
            .get_mut(scope)
            .and_then(|roles| roles.get_mut(&role))
            .map(|set| set.remove(subject))
            .unwrap_or(false)
    }
}

impl RoleAuthority for RoleRegistry {
    fn has_role(&self, scope: &Address, role: Role, subject: &Address) -> bool {
        self.grants
            .get(scope)
            .and_then(|roles| roles.get(&role))
            .map(|set| set.contains(subject))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_administers_itself_and_subordinates() {
        let scope = Address::pool("usdc");
        let admin = Address::from_label("admin");
        let ops = Address::from_label("ops");
        let mut roles = RoleRegistry::new();
        roles.setup_root(&scope, &admin);

        assert!(roles.grant_role(&scope, &admin, Role::Admin, &ops).unwrap());
        assert!(roles.grant_role(&scope, &ops, Role::Depositor, &ops).unwrap());
        assert!(!roles.grant_role(&scope, &ops, Role::Depositor, &ops).unwrap());
        assert!(roles.revoke_role(&scope, &ops, Role::Admin, &admin).unwrap());
        assert!(!roles.has_role(&scope, Role::Admin, &admin));
    }

    #[test]
    fn non_admin_cannot_grant() {
        let scope = Address::pool("usdc");
        let mallory = Address::from_label("mallory");
        let mut roles = RoleRegistry::new();
        let err = roles.grant_role(&scope, &mallory, Role::Withdrawer, &mallory).unwrap_err();
        assert_eq!(
            err,
            Error::Unauthorized { scope, role: Role::Admin, account: mallory }
        );
    }

    #[test]
    fn grants_are_scoped() {
        let admin = Address::from_label("admin");
        let mut roles = RoleRegistry::new();
        roles.setup_root(&Address::pool("a"), &admin);
        assert!(!roles.has_role(&Address::pool("b"), Role::Admin, &admin));
        assert!(roles
            .require_any(&Address::pool("a"), &[Role::Depositor, Role::Admin], &admin)
            .is_ok());
    }

    #[test]
    fn renounce_drops_own_grant() {
        let scope = Address::swap("main");
        let admin = Address::from_label("admin");
        let mut roles = RoleRegistry::new();
        roles.setup_root(&scope, &admin);
        assert!(roles.renounce_role(&scope, &admin, Role::Admin));
        assert!(roles.members(&scope, Role::Admin).is_empty());
    }
}
