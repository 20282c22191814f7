//! Ledger-Swap Rust SDK
//!
//! Everything around the accounting core that a host process needs:
//! deploy an exchange from a JSON config, persist and restore snapshots,
//! stream committed events, and serialize concurrent callers through one
//! service task.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ledger_swap::{Address, Instruction, TracingSink};
//! use ledger_swap_sdk::{DeploymentConfig, ExchangeService, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let genesis = DeploymentConfig::load("exchange.json")?.deploy()?;
//!     let service = ExchangeService::spawn(genesis.exchange, Box::new(TracingSink), SystemClock);
//!
//!     let alice = Address::from_label("alice");
//!     let receipt = service
//!         .execute(alice, Instruction::SwapTokens {
//!             swap:               Address::swap("main"),
//!             token_one:          Address::token("USDC"),
//!             token_one_decimals: 6,
//!             token_two:          Address::token("EURC"),
//!             token_one_amount:   1_000_000,
//!         })
//!         .await?;
//!     println!("{:?}", receipt.outcome);
//!
//!     let exchange = service.shutdown().await?;
//!     ledger_swap_sdk::save_state("state.json", &exchange)?;
//!     Ok(())
//! }
//! ```
//!
//! # Feature Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`DeploymentConfig::deploy`] | Build a wired exchange from JSON |
//! | [`ExchangeService::execute`] | Serialized, atomic instruction submission |
//! | [`ExchangeService::read`] | Consistent read between instructions |
//! | [`save_state`] / [`load_state`] | JSON snapshots of the whole exchange |
//! | [`JsonLinesSink`] | Append-only committed event log |
//! | [`names`] | Label or base58 → address resolution |

pub mod config;
pub mod error;
pub mod names;
pub mod service;
pub mod store;

pub use config::{DeploymentConfig, Genesis};
pub use error::{Error, Result};
pub use service::{Clock, ExchangeService, ManualClock, SystemClock};
pub use store::{load_state, save_state, JsonLinesSink};
