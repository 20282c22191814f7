//! Ledger-Swap: atomic accounting core for custodial token pools, staking,
//! time-locks and fixed-ratio swaps.
//!
//! Instructions, each one all-or-nothing through [`Exchange::process`]:
//!   approve / transfer          : ledger allowance and plain transfers
//!   grant / revoke / renounce   : scoped role management
//!   create_pool / _stake / _swap / _lock : deploy a component, caller is admin
//!   deposit / withdraw          : role-gated custody of one managed token
//!   withdraw_tokens / _native   : admin sweep of anything but the managed token
//!   deposit_reward_tokens       : fund the staking reward pool
//!   stake / unstake             : single position per staker, rate fixed at entry
//!   swap_tokens                 : ratio swap between two pools, royalty fee skimmed
//!   lock / claim                : hold tokens until an unlock date
//!
//! Events are buffered per instruction and only handed out on commit.

pub mod constants;
pub mod context;
pub mod error;
pub mod events;
pub mod exchange;
pub mod instructions;
pub mod ledger;
pub mod roles;
pub mod state;

pub use context::Ctx;
pub use error::{Error, ErrorKind, Result};
pub use events::{ComponentKind, Event, EventLog, EventSink, TracingSink};
pub use exchange::{Exchange, Receipt};
pub use instructions::{Instruction, Outcome, SwapAmounts};
pub use ledger::{BalanceLedger, InMemoryLedger};
pub use roles::{Role, RoleAuthority, RoleRegistry};
pub use state::{
    Address, Amount, LockPosition, ParseAddressError, Pool, StakeLedger, StakePosition, SwapEngine,
    TimeLock, TokenId,
};
