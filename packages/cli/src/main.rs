use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use ledger_swap::{
    Address, Amount, EventSink, Exchange, Instruction, Outcome, Receipt, Role, TracingSink,
};
use ledger_swap_sdk::{
    load_state, names, save_state, Clock, DeploymentConfig, ExchangeService, JsonLinesSink,
    ManualClock, SystemClock,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_STATE: &str = "ledger-swap.json";
const DEFAULT_CALLER: &str = "admin";

/// Print the Ledger-Swap banner to stdout.
fn print_banner() {
    let ver = env!("CARGO_PKG_VERSION");
    println!();
    println!("  Ledger-Swap  v{ver}  ·  atomic token accounting");
    println!("  {}", "─".repeat(62));
    println!("  Components  pools · staking · time-locks · ratio swaps");
    println!("  Amounts     base units, fixed-point rates (6 decimals by default)");
    println!("  State       one JSON snapshot, every command is all-or-nothing");
    println!();
}

// ─── CLI definition ───────────────────────────────────────────────────────────

/// Ledger-Swap: custodial pools, staking, time-locks and ratio swaps.
///
/// Every command supports --json for machine-readable output.
/// Accounts, tokens and components take a label or a base58 address.
/// Component scopes for role commands are written `pool:<label>`,
/// `stake:<label>`, `swap:<label>`, `lock:<label>` or a base58 address.
#[derive(Parser, Debug)]
#[command(
    name    = "ledger-swap",
    version = env!("CARGO_PKG_VERSION"),
    about   = "Atomic accounting for custodial pools, staking, time-locks and fixed-ratio swaps.",
    after_help = "\
ENVIRONMENT:
  LEDGER_SWAP_STATE    State snapshot path  [default: ledger-swap.json]
  LEDGER_SWAP_CALLER   Account the command runs as  [default: admin]
  LEDGER_SWAP_EVENTS   Append committed events to this JSON-lines file
  LEDGER_SWAP_NOW      Fixed timestamp (unix seconds) instead of the wall clock
  RUST_LOG             Log filter, e.g. ledger_swap=debug

QUICK START:
  ledger-swap init --config exchange.json
  ledger-swap --as alice approve --spender swap:main --token USDC --amount 1000000
  ledger-swap quote --swap main --from USDC --to EURC --amount 1000000
  ledger-swap --as alice swap --swap main --from USDC --to EURC --amount 1000000
  ledger-swap balance --account alice --token EURC"
)]
struct Cli {
    /// State snapshot to load and update
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_STATE, env = "LEDGER_SWAP_STATE")]
    state: PathBuf,

    /// Account the command runs as
    #[arg(long = "as", global = true, value_name = "ACCOUNT", env = "LEDGER_SWAP_CALLER")]
    caller: Option<String>,

    /// Append committed events to this JSON-lines file
    #[arg(long, global = true, value_name = "PATH", env = "LEDGER_SWAP_EVENTS")]
    events: Option<PathBuf>,

    /// Timestamp to run at, unix seconds
    #[arg(long, global = true, value_name = "UNIX_SECS", env = "LEDGER_SWAP_NOW")]
    now: Option<u64>,

    /// Output machine-readable JSON instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Admin,
    Depositor,
    Withdrawer,
    Minter,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Role::Admin,
            RoleArg::Depositor => Role::Depositor,
            RoleArg::Withdrawer => Role::Withdrawer,
            RoleArg::Minter => Role::Minter,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy a fresh exchange from a JSON deployment config
    #[command(after_help = "\
EXAMPLES:
  ledger-swap init --config exchange.json
  ledger-swap --state prod.json init --config exchange.json --force")]
    Init {
        #[arg(long, value_name = "FILE")]
        config: PathBuf,

        /// Overwrite an existing state file
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Token balance of an account (defaults to the caller)
    Balance {
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        token: String,
    },

    /// Allow a spender (usually a component) to pull the caller's tokens
    ///
    /// Spender takes an account label, a component scope like `pool:usdc`,
    /// or a base58 address.
    Approve {
        #[arg(long)]
        spender: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Plain transfer between holders
    Transfer {
        #[arg(long)]
        to: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Grant a role on a component scope (admin only)
    #[command(name = "grant-role")]
    GrantRole {
        #[arg(long, value_name = "KIND:LABEL")]
        scope: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        account: String,
    },

    /// Revoke a role on a component scope (admin only)
    #[command(name = "revoke-role")]
    RevokeRole {
        #[arg(long, value_name = "KIND:LABEL")]
        scope: String,
        #[arg(long, value_enum)]
        role: RoleArg,
        #[arg(long)]
        account: String,
    },

    /// Drop one of the caller's own roles
    #[command(name = "renounce-role")]
    RenounceRole {
        #[arg(long, value_name = "KIND:LABEL")]
        scope: String,
        #[arg(long, value_enum)]
        role: RoleArg,
    },

    /// Deposit the pool's token (depositor or admin)
    Deposit {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Pay the pool's token out to a receiver (withdrawer or admin)
    Withdraw {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        amount: Amount,
    },

    #[command(name = "set-depositing")]
    SetDepositing {
        #[arg(long)]
        pool: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Recover a token other than the pool's own (admin only)
    #[command(name = "sweep-tokens")]
    SweepTokens {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Recover native currency held by the pool (admin only)
    #[command(name = "sweep-native")]
    SweepNative {
        #[arg(long)]
        pool: String,
        #[arg(long)]
        receiver: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Fund the staking reward pool (admin only)
    #[command(name = "deposit-rewards")]
    DepositRewards {
        #[arg(long)]
        stake: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Open a staking position at the current interest rate
    Stake {
        #[arg(long)]
        stake: String,
        #[arg(long)]
        amount: Amount,
    },

    /// Close the caller's position and collect the reward
    Unstake {
        #[arg(long)]
        stake: String,
    },

    #[command(name = "set-interest-rate")]
    SetInterestRate {
        #[arg(long)]
        stake: String,
        /// Fixed-point percentage, e.g. 500000 = 0.5% at 6 decimals
        #[arg(long)]
        rate: Amount,
    },

    #[command(name = "set-staking")]
    SetStaking {
        #[arg(long)]
        stake: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    #[command(name = "set-unstaking")]
    SetUnstaking {
        #[arg(long)]
        stake: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Swap one token for another at the configured ratio
    #[command(after_help = "\
EXAMPLES:
  ledger-swap --as alice swap --swap main --from USDC --to EURC --amount 1000000
  ledger-swap --as alice swap --swap main --from USDC --to EURC --amount 1000000 --json

NOTES:
  Approve the swap engine (`swap:<label>`) for the input token first.
  The royalty fee is computed on the output and paid in the input token.")]
    Swap {
        #[arg(long)]
        swap: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Amount,
        /// Decimals of the input token's fixed-point ratio
        #[arg(long, default_value_t = ledger_swap::constants::DEFAULT_DECIMALS)]
        decimals: u8,
    },

    /// Preview a swap without executing it
    Quote {
        #[arg(long)]
        swap: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value_t = ledger_swap::constants::DEFAULT_DECIMALS)]
        decimals: u8,
    },

    #[command(name = "set-token-pool")]
    SetTokenPool {
        #[arg(long)]
        swap: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        pool: String,
    },

    #[command(name = "set-ratio")]
    SetRatio {
        #[arg(long)]
        swap: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        ratio: Amount,
    },

    #[command(name = "set-royalty-fee")]
    SetRoyaltyFee {
        #[arg(long)]
        swap: String,
        #[arg(long)]
        percentage: Amount,
    },

    #[command(name = "set-swap")]
    SetSwap {
        #[arg(long)]
        swap: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Lock the caller's tokens until a unix timestamp
    Lock {
        #[arg(long)]
        lock: String,
        #[arg(long)]
        amount: Amount,
        #[arg(long, value_name = "UNIX_SECS")]
        unlock_date: u64,
    },

    /// Release a lock whose unlock date has passed
    Claim {
        #[arg(long)]
        lock: String,
    },

    #[command(name = "set-locking")]
    SetLocking {
        #[arg(long)]
        lock: String,
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,
    },

    /// Pool counters and gate
    #[command(name = "pool-info")]
    PoolInfo {
        #[arg(long)]
        pool: String,
    },

    /// Staking totals, or one staker's position
    #[command(name = "stake-info")]
    StakeInfo {
        #[arg(long)]
        stake: String,
        #[arg(long)]
        staker: Option<String>,
    },

    /// Run a script of commands, one per line, each its own transaction
    #[command(after_help = "\
SCRIPT FORMAT:
  # comments and blank lines are skipped
  --as alice approve --spender swap:main --token USDC --amount 1000000
  --as alice --now 1700000000 swap --swap main --from USDC --to EURC --amount 1000000

NOTES:
  Lines share one session: the state is saved once at the end.
  A failing line stops the script unless --keep-going is set;
  earlier lines stay committed.")]
    Run {
        #[arg(long, value_name = "FILE")]
        script: PathBuf,

        #[arg(long, default_value_t = false)]
        keep_going: bool,
    },
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // When invoked with no arguments, show banner + full help and exit cleanly.
    if std::env::args().len() == 1 {
        print_banner();
        Cli::command().print_long_help().ok();
        println!();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Init { config, force } => cmd_init(&cli, config, *force),
        Commands::Run { script, keep_going } => cmd_run(&cli, script, *keep_going).await,
        Commands::Balance { account, token } => cmd_balance(&cli, account.as_deref(), token),
        Commands::Quote { swap, from, to, amount, decimals } => {
            cmd_quote(&cli, swap, from, to, *amount, *decimals)
        }
        Commands::PoolInfo { pool } => cmd_pool_info(&cli, pool),
        Commands::StakeInfo { stake, staker } => cmd_stake_info(&cli, stake, staker.as_deref()),
        command => {
            let instruction = build_instruction(command)?
                .ok_or_else(|| anyhow!("command does not change state"))?;
            let name = instruction.name();
            let mut session = Session::open(&cli)?;
            let result = session.execute(&cli, instruction).await;
            session.close().await?;
            print_receipt(&cli, name, &result?)
        }
    }
}

// ─── Name resolution ──────────────────────────────────────────────────────────

fn caller_of(cli: &Cli) -> Result<Address> {
    let name = cli.caller.as_deref().unwrap_or(DEFAULT_CALLER);
    names::account(name).with_context(|| format!("invalid caller '{name}'"))
}

/// `pool:usdc`, `stake:main`, `swap:main`, `lock:vesting` or a base58 address.
fn resolve_scope(input: &str) -> Result<Address> {
    match input.split_once(':') {
        Some(("pool", label)) => Ok(names::pool(label)?),
        Some(("stake", label)) => Ok(names::stake(label)?),
        Some(("swap", label)) => Ok(names::swap(label)?),
        Some(("lock", label)) => Ok(names::lock(label)?),
        Some((kind, _)) => bail!("Unknown component kind '{kind}'. Use pool, stake, swap or lock."),
        None => input.parse::<Address>().map_err(|e| anyhow!("{e}\n  Component scopes look like `pool:<label>`.")),
    }
}

/// Spenders are usually components; plain labels are holder accounts.
fn resolve_spender(input: &str) -> Result<Address> {
    if input.contains(':') {
        resolve_scope(input)
    } else {
        Ok(names::account(input)?)
    }
}

fn build_instruction(command: &Commands) -> Result<Option<Instruction>> {
    let ix = match command {
        Commands::Approve { spender, token, amount } => Instruction::Approve {
            spender: resolve_spender(spender)?,
            token: names::token(token)?,
            amount: *amount,
        },
        Commands::Transfer { to, token, amount } => Instruction::Transfer {
            to: names::account(to)?,
            token: names::token(token)?,
            amount: *amount,
        },
        Commands::GrantRole { scope, role, account } => Instruction::GrantRole {
            scope: resolve_scope(scope)?,
            role: (*role).into(),
            account: resolve_spender(account)?,
        },
        Commands::RevokeRole { scope, role, account } => Instruction::RevokeRole {
            scope: resolve_scope(scope)?,
            role: (*role).into(),
            account: resolve_spender(account)?,
        },
        Commands::RenounceRole { scope, role } => Instruction::RenounceRole {
            scope: resolve_scope(scope)?,
            role: (*role).into(),
        },
        Commands::Deposit { pool, amount } => Instruction::Deposit {
            pool: names::pool(pool)?,
            amount: *amount,
        },
        Commands::Withdraw { pool, receiver, amount } => Instruction::Withdraw {
            pool: names::pool(pool)?,
            receiver: names::account(receiver)?,
            amount: *amount,
        },
        Commands::SetDepositing { pool, enabled } => Instruction::SetDepositingEnabled {
            pool: names::pool(pool)?,
            enabled: *enabled,
        },
        Commands::SweepTokens { pool, token, receiver, amount } => Instruction::WithdrawTokens {
            pool: names::pool(pool)?,
            token: names::token(token)?,
            receiver: names::account(receiver)?,
            amount: *amount,
        },
        Commands::SweepNative { pool, receiver, amount } => Instruction::WithdrawNativeTokens {
            pool: names::pool(pool)?,
            receiver: names::account(receiver)?,
            amount: *amount,
        },
        Commands::DepositRewards { stake, amount } => Instruction::DepositRewardTokens {
            stake: names::stake(stake)?,
            amount: *amount,
        },
        Commands::Stake { stake, amount } => Instruction::Stake {
            stake: names::stake(stake)?,
            amount: *amount,
        },
        Commands::Unstake { stake } => Instruction::Unstake { stake: names::stake(stake)? },
        Commands::SetInterestRate { stake, rate } => Instruction::SetInterestRate {
            stake: names::stake(stake)?,
            interest_rate: *rate,
        },
        Commands::SetStaking { stake, enabled } => Instruction::SetStakingEnabled {
            stake: names::stake(stake)?,
            enabled: *enabled,
        },
        Commands::SetUnstaking { stake, enabled } => Instruction::SetUnstakingEnabled {
            stake: names::stake(stake)?,
            enabled: *enabled,
        },
        Commands::Swap { swap, from, to, amount, decimals } => Instruction::SwapTokens {
            swap: names::swap(swap)?,
            token_one: names::token(from)?,
            token_one_decimals: *decimals,
            token_two: names::token(to)?,
            token_one_amount: *amount,
        },
        Commands::SetTokenPool { swap, token, pool } => Instruction::SetTokenPoolAddress {
            swap: names::swap(swap)?,
            token: names::token(token)?,
            pool: names::pool(pool)?,
        },
        Commands::SetRatio { swap, from, to, ratio } => Instruction::SetTokenRatio {
            swap: names::swap(swap)?,
            token_one: names::token(from)?,
            token_two: names::token(to)?,
            ratio: *ratio,
        },
        Commands::SetRoyaltyFee { swap, percentage } => Instruction::SetRoyaltyFeePercentage {
            swap: names::swap(swap)?,
            percentage: *percentage,
        },
        Commands::SetSwap { swap, enabled } => Instruction::SetSwapEnabled {
            swap: names::swap(swap)?,
            enabled: *enabled,
        },
        Commands::Lock { lock, amount, unlock_date } => Instruction::Lock {
            lock: names::lock(lock)?,
            amount: *amount,
            unlock_date: *unlock_date,
        },
        Commands::Claim { lock } => Instruction::Claim { lock: names::lock(lock)? },
        Commands::SetLocking { lock, enabled } => Instruction::SetLockingEnabled {
            lock: names::lock(lock)?,
            enabled: *enabled,
        },
        Commands::Init { .. }
        | Commands::Run { .. }
        | Commands::Balance { .. }
        | Commands::Quote { .. }
        | Commands::PoolInfo { .. }
        | Commands::StakeInfo { .. } => return Ok(None),
    };
    Ok(Some(ix))
}

// ─── Session ──────────────────────────────────────────────────────────────────

/// Loaded state running inside an [`ExchangeService`] until closed.
struct Session {
    service: ExchangeService,
    clock:   ManualClock,
    state:   PathBuf,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self> {
        let exchange = read_state(&cli.state)?;
        let sink: Box<dyn EventSink + Send> = match &cli.events {
            Some(path) => Box::new(
                JsonLinesSink::append(path)
                    .with_context(|| format!("Cannot open event log '{}'", path.display()))?,
            ),
            None => Box::new(TracingSink),
        };
        let clock = ManualClock::new(cli.now.unwrap_or_else(|| SystemClock.now()));
        let service = ExchangeService::spawn(exchange, sink, clock.clone());
        Ok(Self { service, clock, state: cli.state.clone() })
    }

    /// Run one instruction as the command line's caller.
    async fn execute(&mut self, cli: &Cli, instruction: Instruction) -> Result<Receipt> {
        if let Some(now) = cli.now {
            self.clock.set(now);
        }
        let caller = caller_of(cli)?;
        let name = instruction.name();
        debug!(instruction = name, %caller, "submitting");
        self.service
            .execute(caller, instruction)
            .await
            .with_context(|| format!("{name} rejected"))
    }

    async fn close(self) -> Result<()> {
        let exchange = self.service.shutdown().await?;
        save_state(&self.state, &exchange)
            .with_context(|| format!("Cannot save state to '{}'", self.state.display()))
    }
}

fn read_state(path: &Path) -> Result<Exchange> {
    if !path.exists() {
        bail!(
            "No state at '{}'.\n  Run `ledger-swap init --config <FILE>` to deploy an exchange first.",
            path.display()
        );
    }
    load_state(path).with_context(|| format!("Cannot load state from '{}'", path.display()))
}

// ─── Output ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    status:  &'static str,
    command: &'a str,
    #[serde(flatten)]
    body:    T,
}

fn print_json<T: Serialize>(command: &str, body: T) -> Result<()> {
    let report = Report { status: "ok", command, body };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_receipt(cli: &Cli, name: &str, receipt: &Receipt) -> Result<()> {
    if cli.json {
        return print_json(name, receipt);
    }

    println!("─── {name} ───────────────────────────────────────────────────────");
    println!("  Caller           {}", receipt.caller);
    println!("  Timestamp        {}", receipt.timestamp);
    match &receipt.outcome {
        Outcome::Done => {}
        Outcome::Created { account } => println!("  Account          {account}"),
        Outcome::RoleChanged { changed } => {
            println!("  Membership       {}", if *changed { "changed" } else { "unchanged" })
        }
        Outcome::Swapped(amounts) => {
            println!("  Sold             {:>24}", amounts.token_one_amount);
            println!("  Gross out        {:>24}", amounts.gross_two_amount);
            println!("  Royalty fee      {:>24}", amounts.fee);
            println!("  Received         {:>24}", amounts.net_two_amount);
            println!("  Pool deposit     {:>24}", amounts.pool_deposit);
        }
        Outcome::Unstaked { amount, reward } => {
            println!("  Principal        {amount:>24}");
            println!("  Reward           {reward:>24}");
        }
        Outcome::Claimed { amount } => println!("  Released         {amount:>24}"),
    }
    let events: Vec<_> = receipt.events.iter().map(|e| e.name()).collect();
    println!(
        "  Events           {}",
        if events.is_empty() { "none".to_string() } else { events.join(", ") }
    );
    Ok(())
}

// ─── init ─────────────────────────────────────────────────────────────────────

fn cmd_init(cli: &Cli, config_path: &Path, force: bool) -> Result<()> {
    if cli.state.exists() && !force {
        bail!(
            "State '{}' already exists.\n  Pass --force to replace it.",
            cli.state.display()
        );
    }
    let config = DeploymentConfig::load(config_path)
        .with_context(|| format!("Cannot read config '{}'", config_path.display()))?;
    let genesis = config.deploy().context("Genesis deployment failed")?;
    save_state(&cli.state, &genesis.exchange)
        .with_context(|| format!("Cannot save state to '{}'", cli.state.display()))?;

    if let Some(path) = &cli.events {
        let mut sink = JsonLinesSink::append(path)?;
        for event in &genesis.events {
            sink.publish(event);
        }
    }

    let ex = &genesis.exchange;
    if cli.json {
        #[derive(Serialize)]
        struct Deployed<'a> {
            state:  &'a Path,
            pools:  Vec<Address>,
            stakes: Vec<Address>,
            swaps:  Vec<Address>,
            locks:  Vec<Address>,
            events: usize,
        }
        return print_json("init", Deployed {
            state:  &cli.state,
            pools:  ex.pools.keys().copied().collect(),
            stakes: ex.stakes.keys().copied().collect(),
            swaps:  ex.swaps.keys().copied().collect(),
            locks:  ex.locks.keys().copied().collect(),
            events: genesis.events.len(),
        });
    }

    println!("─── Exchange Deployed ────────────────────────────────────────────");
    println!("  State            {}", cli.state.display());
    for (label, keys) in [
        ("Pools", ex.pools.keys().collect::<Vec<_>>()),
        ("Stakes", ex.stakes.keys().collect()),
        ("Swaps", ex.swaps.keys().collect()),
        ("Locks", ex.locks.keys().collect()),
    ] {
        for key in keys {
            println!("  {label:<16} {key}");
        }
    }
    println!("  Genesis events   {}", genesis.events.len());
    Ok(())
}

// ─── run ──────────────────────────────────────────────────────────────────────

/// Parse one script line into a full command line.
fn parse_script_line(line: &str) -> Result<Option<Cli>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let args = std::iter::once("ledger-swap").chain(line.split_whitespace());
    let parsed = Cli::try_parse_from(args).map_err(|e| anyhow!("{e}"))?;
    Ok(Some(parsed))
}

async fn cmd_run(cli: &Cli, script: &Path, keep_going: bool) -> Result<()> {
    let text = std::fs::read_to_string(script)
        .with_context(|| format!("Cannot read script '{}'", script.display()))?;

    let mut session = Session::open(cli)?;
    let mut committed = 0usize;
    let mut failed = 0usize;
    let mut first_error = None;

    for (index, line) in text.lines().enumerate() {
        let lineno = index + 1;
        let step = match parse_script_line(line) {
            Ok(Some(step)) => step,
            Ok(None) => continue,
            Err(e) => {
                session.close().await?;
                return Err(e.context(format!("{}:{lineno}", script.display())));
            }
        };
        let instruction = match build_instruction(&step.command) {
            Ok(Some(ix)) => ix,
            Ok(None) => {
                session.close().await?;
                bail!("{}:{lineno}: only state-changing commands can be scripted", script.display());
            }
            Err(e) => {
                session.close().await?;
                return Err(e.context(format!("{}:{lineno}", script.display())));
            }
        };
        // lines inherit the outer caller unless they name their own
        let step = Cli { caller: step.caller.or_else(|| cli.caller.clone()), ..step };

        match session.execute(&step, instruction).await {
            Ok(receipt) => {
                committed += 1;
                if !cli.json {
                    println!("{lineno:>4}  ok    {}", line.trim());
                }
                debug!(line = lineno, events = receipt.events.len(), "script step committed");
            }
            Err(err) => {
                failed += 1;
                if !cli.json {
                    println!("{lineno:>4}  FAIL  {}\n        {err:#}", line.trim());
                }
                if !keep_going {
                    first_error = Some(err.context(format!("{}:{lineno}", script.display())));
                    break;
                }
            }
        }
    }

    session.close().await?;
    if cli.json {
        #[derive(Serialize)]
        struct Summary {
            committed: usize,
            failed:    usize,
        }
        print_json("run", Summary { committed, failed })?;
    } else {
        println!("  {committed} committed, {failed} failed");
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

// ─── Views ────────────────────────────────────────────────────────────────────

fn cmd_balance(cli: &Cli, account: Option<&str>, token: &str) -> Result<()> {
    let exchange = read_state(&cli.state)?;
    let account = match account {
        Some(name) => names::account(name)?,
        None => caller_of(cli)?,
    };
    let token_id = names::token(token)?;
    let balance = exchange.balance_of(&account, &token_id);

    if cli.json {
        #[derive(Serialize)]
        struct Balance {
            account: Address,
            token:   Address,
            balance: Amount,
        }
        return print_json("balance", Balance { account, token: token_id, balance });
    }
    println!("  {token:<8} {balance:>24}   {account}");
    Ok(())
}

fn cmd_quote(cli: &Cli, swap: &str, from: &str, to: &str, amount: Amount, decimals: u8) -> Result<()> {
    let exchange = read_state(&cli.state)?;
    let amounts = exchange
        .quote_swap(&names::swap(swap)?, &names::token(from)?, decimals, &names::token(to)?, amount)
        .context("Quote failed")?;

    if cli.json {
        return print_json("quote", amounts);
    }
    println!("─── Quote  {from} → {to} ──────────────────────────────────────────");
    println!("  Sell             {:>24}", amounts.token_one_amount);
    println!("  Gross out        {:>24}", amounts.gross_two_amount);
    println!("  Royalty fee      {:>24}", amounts.fee);
    println!("  You receive      {:>24}", amounts.net_two_amount);
    Ok(())
}

fn cmd_pool_info(cli: &Cli, pool: &str) -> Result<()> {
    let exchange = read_state(&cli.state)?;
    let address = names::pool(pool)?;
    let info = exchange
        .pool(&address)
        .ok_or_else(|| anyhow!("No pool '{pool}' ({address})"))?;
    let held = exchange.balance_of(&address, &info.token);

    if cli.json {
        #[derive(Serialize)]
        struct PoolInfo<'a> {
            #[serde(flatten)]
            pool:           &'a ledger_swap::Pool,
            ledger_balance: Amount,
        }
        return print_json("pool-info", PoolInfo { pool: info, ledger_balance: held });
    }
    println!("─── Pool {pool} ──────────────────────────────────────────────────");
    println!("  Account          {}", info.account);
    println!("  Token            {}", info.token);
    println!("  Counter          {:>24}", info.pool_balance);
    println!("  Ledger balance   {held:>24}");
    println!("  Depositing       {}", if info.depositing_enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn cmd_stake_info(cli: &Cli, stake: &str, staker: Option<&str>) -> Result<()> {
    let exchange = read_state(&cli.state)?;
    let address = names::stake(stake)?;
    let info = exchange
        .stake_ledger(&address)
        .ok_or_else(|| anyhow!("No stake '{stake}' ({address})"))?;

    if let Some(name) = staker {
        let who = names::account(name)?;
        let position = info.position(&who).cloned().unwrap_or_default();
        if cli.json {
            return print_json("stake-info", position);
        }
        println!("─── Position {name} in {stake} ────────────────────────────────────");
        println!("  Staked           {}", if position.staked { "yes" } else { "no" });
        println!("  Amount           {:>24}", position.amount);
        println!("  Rate             {:>24}", position.interest_rate);
        println!("  Since            {}", position.date);
        return Ok(());
    }

    if cli.json {
        #[derive(Serialize)]
        struct Totals {
            account:                   Address,
            token:                     Address,
            decimals:                  u8,
            interest_rate:             Amount,
            staking_enabled:           bool,
            unstaking_enabled:         bool,
            total_staker_count:        u64,
            total_staked_token_amount: Amount,
            reward_token_pool_balance: Amount,
        }
        return print_json("stake-info", Totals {
            account:                   info.account,
            token:                     info.token,
            decimals:                  info.decimals,
            interest_rate:             info.interest_rate,
            staking_enabled:           info.staking_enabled,
            unstaking_enabled:         info.unstaking_enabled,
            total_staker_count:        info.total_staker_count,
            total_staked_token_amount: info.total_staked_token_amount,
            reward_token_pool_balance: info.reward_token_pool_balance,
        });
    }
    println!("─── Stake {stake} ────────────────────────────────────────────────");
    println!("  Account          {}", info.account);
    println!("  Token            {}  ({} decimals)", info.token, info.decimals);
    println!("  Interest rate    {:>24}", info.interest_rate);
    println!("  Stakers          {:>24}", info.total_staker_count);
    println!("  Total staked     {:>24}", info.total_staked_token_amount);
    println!("  Reward pool      {:>24}", info.reward_token_pool_balance);
    println!(
        "  Gates            staking {}, unstaking {}",
        if info.staking_enabled { "on" } else { "off" },
        if info.unstaking_enabled { "on" } else { "off" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_resolve_by_kind() {
        assert_eq!(resolve_scope("pool:usdc").unwrap(), Address::pool("usdc"));
        assert_eq!(resolve_scope("swap:main").unwrap(), Address::swap("main"));
        let raw = Address::lock("vesting").to_string();
        assert_eq!(resolve_scope(&raw).unwrap(), Address::lock("vesting"));
        assert!(resolve_scope("vault:x").is_err());
        assert!(resolve_scope("usdc").is_err());
    }

    #[test]
    fn spenders_default_to_accounts() {
        assert_eq!(resolve_spender("bob").unwrap(), Address::from_label("bob"));
        assert_eq!(resolve_spender("stake:main").unwrap(), Address::stake("main"));
    }

    #[test]
    fn script_lines_parse_into_instructions() {
        assert!(parse_script_line("   # comment").unwrap().is_none());
        assert!(parse_script_line("").unwrap().is_none());

        let step = parse_script_line("--as alice swap --swap main --from USDC --to EURC --amount 5")
            .unwrap()
            .unwrap();
        assert_eq!(step.caller.as_deref(), Some("alice"));
        let ix = build_instruction(&step.command).unwrap().unwrap();
        assert_eq!(
            ix,
            Instruction::SwapTokens {
                swap: Address::swap("main"),
                token_one: Address::token("USDC"),
                token_one_decimals: 6,
                token_two: Address::token("EURC"),
                token_one_amount: 5,
            }
        );

        let gate = parse_script_line("set-swap --swap main --enabled false").unwrap().unwrap();
        assert_eq!(
            build_instruction(&gate.command).unwrap(),
            Some(Instruction::SetSwapEnabled { swap: Address::swap("main"), enabled: false })
        );
    }

    #[test]
    fn views_are_not_scriptable() {
        let step = parse_script_line("pool-info --pool usdc").unwrap().unwrap();
        assert!(build_instruction(&step.command).unwrap().is_none());
    }
}
