//! Name resolution.
//!
//! Anywhere the SDK or CLI takes an account, token or component it accepts
//! either a base58 address or a human-readable label. Labels are turned into
//! addresses with the same derivation the core uses when a component is
//! created, so `"usdc-pool"` names the pool created with label `usdc-pool`.

use ledger_swap::Address;

use crate::error::{Error, Result};

fn resolve(input: &str, derive: fn(&str) -> Address) -> Result<Address> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Config("empty name".into()));
    }
    Ok(input.parse().unwrap_or_else(|_| derive(input)))
}

/// Holder account.
pub fn account(input: &str) -> Result<Address> {
    resolve(input, Address::from_label)
}

/// Token denomination, by symbol.
pub fn token(input: &str) -> Result<Address> {
    resolve(input, Address::token)
}

pub fn pool(input: &str) -> Result<Address> {
    resolve(input, Address::pool)
}

pub fn stake(input: &str) -> Result<Address> {
    resolve(input, Address::stake)
}

pub fn swap(input: &str) -> Result<Address> {
    resolve(input, Address::swap)
}

pub fn lock(input: &str) -> Result<Address> {
    resolve(input, Address::lock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_base58_resolve_to_the_same_address() {
        let by_label = pool("usdc").unwrap();
        assert_eq!(by_label, Address::pool("usdc"));
        assert_eq!(pool(&by_label.to_string()).unwrap(), by_label);
        // kind matters for labels
        assert_ne!(stake("usdc").unwrap(), by_label);
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(account("  "), Err(Error::Config(_))));
    }
}
