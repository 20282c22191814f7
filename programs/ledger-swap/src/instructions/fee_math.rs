use serde::{Deserialize, Serialize};

use crate::{
    constants::{MAX_DECIMALS, PERCENT_BASE},
    error::{Error, Result},
    state::Amount,
};

/// Amounts produced by one swap, shared by `swap_tokens` and `quote_swap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapAmounts {
    /// token_one sold by the caller
    pub token_one_amount: Amount,
    /// token_two value before the royalty skim
    pub gross_two_amount: Amount,
    /// Royalty, computed on the output and paid in token_one
    pub fee: Amount,
    /// token_two paid to the caller (gross − fee)
    pub net_two_amount: Amount,
    /// token_one credited to the token_one pool (amount − fee)
    pub pool_deposit: Amount,
}

/// `10^decimals`, rejecting exponents that overflow u128.
pub fn pow10(decimals: u8) -> Result<u128> {
    if decimals > MAX_DECIMALS {
        return Err(Error::MathOverflow);
    }
    10u128.checked_pow(decimals as u32).ok_or(Error::MathOverflow)
}

/// `floor(amount * ratio / 10^decimals)`
pub fn convert_amount(amount: Amount, ratio: Amount, decimals: u8) -> Result<Amount> {
    Ok(amount.checked_mul(ratio).ok_or(Error::MathOverflow)? / pow10(decimals)?)
}

/// `floor(amount * percentage / (100 * 10^decimals))`
///
/// Royalty fees and staking rewards share this formula.
pub fn percentage_of(amount: Amount, percentage: Amount, decimals: u8) -> Result<Amount> {
    let base = PERCENT_BASE
        .checked_mul(pow10(decimals)?)
        .ok_or(Error::MathOverflow)?;
    Ok(amount.checked_mul(percentage).ok_or(Error::MathOverflow)? / base)
}

/// Reward paid on unstake for a position locked at `interest_rate`.
pub fn stake_reward(amount: Amount, interest_rate: Amount, decimals: u8) -> Result<Amount> {
    percentage_of(amount, interest_rate, decimals)
}

/// Compute gross output, royalty fee, net output and the pool-one deposit.
///
/// * `token_one_amount`       – raw amount the caller is selling
/// * `ratio`                  – token_one → token_two ratio at `decimals`
/// * `royalty_fee_percentage` – fee on the output at `decimals`
/// * `decimals`               – fixed-point base of token_one
pub fn compute_swap(
    token_one_amount: Amount,
    ratio: Amount,
    royalty_fee_percentage: Amount,
    decimals: u8,
) -> Result<SwapAmounts> {
    let gross_two_amount = convert_amount(token_one_amount, ratio, decimals)?;
    let fee = percentage_of(gross_two_amount, royalty_fee_percentage, decimals)?;
    // fee exceeds gross only when the percentage is above 100%
    let net_two_amount = gross_two_amount
        .checked_sub(fee)
        .ok_or(Error::MathOverflow)?;
    let pool_deposit = token_one_amount
        .checked_sub(fee)
        .ok_or(Error::MathOverflow)?;

    Ok(SwapAmounts {
        token_one_amount,
        gross_two_amount,
        fee,
        net_two_amount,
        pool_deposit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_matches_worked_example() {
        assert_eq!(stake_reward(100_000_000, 500_000, 6).unwrap(), 500_000);
    }

    #[test]
    fn swap_matches_worked_example() {
        // 0.10 / 0.05 → ratio 2.0 at 6 decimals, royalty 500_000
        let amounts = compute_swap(10_000_000_000, 2_000_000, 500_000, 6).unwrap();
        assert_eq!(amounts.gross_two_amount, 20_000_000_000);
        assert_eq!(amounts.fee, 100_000_000);
        assert_eq!(amounts.net_two_amount, 19_900_000_000);
        assert_eq!(amounts.pool_deposit, 9_900_000_000);
    }

    #[test]
    fn conversion_floors() {
        assert_eq!(convert_amount(3, 1_500_000, 6).unwrap(), 4);
        assert_eq!(percentage_of(199, 1_000_000, 6).unwrap(), 1);
    }

    #[test]
    fn unset_ratio_yields_zero_output() {
        let amounts = compute_swap(1_000, 0, 500_000, 6).unwrap();
        assert_eq!(amounts.net_two_amount, 0);
        assert_eq!(amounts.pool_deposit, 1_000);
    }

    #[test]
    fn overflow_is_reported() {
        assert_eq!(convert_amount(u128::MAX, 2, 6), Err(Error::MathOverflow));
        assert_eq!(pow10(39), Err(Error::MathOverflow));
        // fee larger than the input it is deducted from
        assert_eq!(compute_swap(10, 1_000_000_000, 100_000_000, 6), Err(Error::MathOverflow));
    }
}
