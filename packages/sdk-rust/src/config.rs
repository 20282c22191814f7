//! JSON deployment config.
//!
//! A config describes a whole exchange at genesis: who administers it, which
//! tokens exist, opening balances and every component with its wiring.
//! [`DeploymentConfig::deploy`] replays it as ordinary instructions signed by
//! the admin, so a deployed world passes through exactly the same checks as
//! one built by hand.
//!
//! ```json
//! {
//!   "admin": "admin",
//!   "tokens": [{ "symbol": "USDC", "decimals": 6 }, { "symbol": "EURC" }],
//!   "balances": [{ "account": "alice", "token": "USDC", "amount": 1000000000 }],
//!   "pools": [{ "label": "usdc", "token": "USDC" }, { "label": "eurc", "token": "EURC", "seed": 500000000 }],
//!   "swaps": [{
//!     "label": "main", "royalty_fee_wallet": "treasury", "royalty_fee_percentage": 500000,
//!     "pools": { "USDC": "usdc", "EURC": "eurc" },
//!     "ratios": [{ "from": "USDC", "to": "EURC", "ratio": 920000 }]
//!   }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use ledger_swap::{
    constants::DEFAULT_DECIMALS,
    Address, Amount, Event, Exchange, Instruction, Outcome, Role,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::names;

fn enabled() -> bool {
    true
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploymentConfig {
    /// Signs every genesis instruction and becomes root admin of each component.
    pub admin: String,
    /// Timestamp recorded on genesis instructions.
    #[serde(default)]
    pub genesis_time: u64,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    #[serde(default)]
    pub balances: Vec<BalanceConfig>,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    #[serde(default)]
    pub stakes: Vec<StakeConfig>,
    #[serde(default)]
    pub swaps: Vec<SwapConfig>,
    #[serde(default)]
    pub locks: Vec<LockConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// Opening balance. Without `token` the amount is native currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BalanceConfig {
    pub account: String,
    #[serde(default)]
    pub token: Option<String>,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    pub label: String,
    pub token: String,
    #[serde(default)]
    pub depositors: Vec<String>,
    #[serde(default)]
    pub withdrawers: Vec<String>,
    #[serde(default = "enabled")]
    pub depositing_enabled: bool,
    /// Deposited from the admin's opening balance.
    #[serde(default)]
    pub seed: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StakeConfig {
    pub label: String,
    pub token: String,
    pub interest_rate: Amount,
    /// Falls back to the token's configured decimals.
    #[serde(default)]
    pub decimals: Option<u8>,
    /// Funded from the admin's opening balance.
    #[serde(default)]
    pub reward_deposit: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SwapConfig {
    pub label: String,
    pub royalty_fee_wallet: String,
    pub royalty_fee_percentage: Amount,
    /// token → pool custodying it
    #[serde(default)]
    pub pools: BTreeMap<String, String>,
    #[serde(default)]
    pub ratios: Vec<RatioConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RatioConfig {
    pub from: String,
    pub to: String,
    pub ratio: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockConfig {
    pub label: String,
    pub token: String,
}

/// A freshly deployed exchange plus everything genesis emitted.
#[derive(Debug, Clone)]
pub struct Genesis {
    pub exchange: Exchange,
    pub events: Vec<Event>,
}

impl DeploymentConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Configured decimals for `token`, [`DEFAULT_DECIMALS`] when unlisted.
    pub fn decimals_of(&self, token: &Address) -> u8 {
        self.tokens
            .iter()
            .find(|t| names::token(&t.symbol).ok().as_ref() == Some(token))
            .map(|t| t.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    /// Build the exchange this config describes.
    pub fn deploy(&self) -> Result<Genesis> {
        let admin = names::account(&self.admin)?;
        let mut genesis = Deployer {
            exchange: Exchange::new(),
            events: Vec::new(),
            admin,
            now: self.genesis_time,
        };

        for balance in &self.balances {
            let account = names::account(&balance.account)?;
            let minted = match &balance.token {
                Some(token) => genesis.exchange.ledger.mint(&account, &names::token(token)?, balance.amount),
                None => genesis.exchange.ledger.mint_native(&account, balance.amount),
            };
            if !minted {
                return Err(Error::Config(format!("opening balance for {} overflows", balance.account)));
            }
        }

        for pool in &self.pools {
            let token = names::token(&pool.token)?;
            let account = genesis.create(Instruction::CreatePool { label: pool.label.clone(), token })?;
            for who in &pool.depositors {
                genesis.grant(account, Role::Depositor, names::account(who)?)?;
            }
            for who in &pool.withdrawers {
                genesis.grant(account, Role::Withdrawer, names::account(who)?)?;
            }
            if pool.seed > 0 {
                genesis.apply(Instruction::Approve { spender: account, token, amount: pool.seed })?;
                genesis.apply(Instruction::Deposit { pool: account, amount: pool.seed })?;
            }
            if !pool.depositing_enabled {
                genesis.apply(Instruction::SetDepositingEnabled { pool: account, enabled: false })?;
            }
        }

        for stake in &self.stakes {
            let token = names::token(&stake.token)?;
            let decimals = stake.decimals.unwrap_or_else(|| self.decimals_of(&token));
            let account = genesis.create(Instruction::CreateStake {
                label: stake.label.clone(),
                token,
                decimals,
                interest_rate: stake.interest_rate,
            })?;
            if stake.reward_deposit > 0 {
                genesis.apply(Instruction::Approve { spender: account, token, amount: stake.reward_deposit })?;
                genesis.apply(Instruction::DepositRewardTokens { stake: account, amount: stake.reward_deposit })?;
            }
        }

        for swap in &self.swaps {
            let account = genesis.create(Instruction::CreateSwap {
                label: swap.label.clone(),
                royalty_fee_wallet: names::account(&swap.royalty_fee_wallet)?,
                royalty_fee_percentage: swap.royalty_fee_percentage,
            })?;
            for (token, pool) in &swap.pools {
                let token = names::token(token)?;
                let pool = names::pool(pool)?;
                // the engine feeds every registered pool and pays out of it
                genesis.grant(pool, Role::Depositor, account)?;
                genesis.grant(pool, Role::Withdrawer, account)?;
                genesis.apply(Instruction::SetTokenPoolAddress { swap: account, token, pool })?;
            }
            for ratio in &swap.ratios {
                genesis.apply(Instruction::SetTokenRatio {
                    swap: account,
                    token_one: names::token(&ratio.from)?,
                    token_two: names::token(&ratio.to)?,
                    ratio: ratio.ratio,
                })?;
            }
        }

        for lock in &self.locks {
            let token = names::token(&lock.token)?;
            genesis.create(Instruction::CreateLock { label: lock.label.clone(), token })?;
        }

        info!(
            admin = %admin,
            pools = genesis.exchange.pools.len(),
            stakes = genesis.exchange.stakes.len(),
            swaps = genesis.exchange.swaps.len(),
            locks = genesis.exchange.locks.len(),
            events = genesis.events.len(),
            "genesis deployed"
        );
        Ok(Genesis { exchange: genesis.exchange, events: genesis.events })
    }
}

struct Deployer {
    exchange: Exchange,
    events: Vec<Event>,
    admin: Address,
    now: u64,
}

impl Deployer {
    fn apply(&mut self, instruction: Instruction) -> Result<Outcome> {
        let receipt = self.exchange.process(self.admin, self.now, &instruction)?;
        self.events.extend(receipt.events);
        Ok(receipt.outcome)
    }

    fn create(&mut self, instruction: Instruction) -> Result<Address> {
        match self.apply(instruction)? {
            Outcome::Created { account } => Ok(account),
            other => Err(Error::Config(format!("unexpected genesis outcome {other:?}"))),
        }
    }

    fn grant(&mut self, scope: Address, role: Role, account: Address) -> Result<()> {
        self.apply(Instruction::GrantRole { scope, role, account })?;
        Ok(())
    }
}
