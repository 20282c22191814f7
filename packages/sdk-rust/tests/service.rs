use std::sync::{Arc, Mutex};

use ledger_swap::{
    constants::UNLIMITED_ALLOWANCE, Address, Event, EventSink, Exchange, Instruction, Outcome,
};
use ledger_swap_sdk::{
    load_state, save_state, DeploymentConfig, Error, ExchangeService, JsonLinesSink, ManualClock,
};
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "admin": "admin",
    "tokens": [{ "symbol": "USDC" }, { "symbol": "EURC" }],
    "balances": [
        { "account": "alice", "token": "USDC", "amount": 10000000000 },
        { "account": "admin", "token": "EURC", "amount": 50000000000 },
        { "account": "admin", "token": "USDC", "amount": 10000000 }
    ],
    "pools": [
        { "label": "usdc", "token": "USDC" },
        { "label": "eurc", "token": "EURC", "seed": 50000000000 }
    ],
    "stakes": [{ "label": "main", "token": "USDC", "interest_rate": 500000, "reward_deposit": 10000000 }],
    "swaps": [{
        "label": "main",
        "royalty_fee_wallet": "treasury",
        "royalty_fee_percentage": 500000,
        "pools": { "USDC": "usdc", "EURC": "eurc" },
        "ratios": [{ "from": "USDC", "to": "EURC", "ratio": 2000000 }]
    }],
    "locks": [{ "label": "vesting", "token": "USDC" }]
}"#;

/// Collects events behind a shared handle so the test can inspect them
/// while the service owns the sink.
#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<Event>>>);

impl SharedLog {
    fn names(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().iter().map(Event::name).collect()
    }
}

impl EventSink for SharedLog {
    fn publish(&mut self, event: &Event) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn genesis() -> Exchange {
    let config: DeploymentConfig = serde_json::from_str(CONFIG).unwrap();
    config.deploy().unwrap().exchange
}

fn alice() -> Address {
    Address::from_label("alice")
}

fn swap_usdc_for_eurc(amount: u128) -> Instruction {
    Instruction::SwapTokens {
        swap: Address::swap("main"),
        token_one: Address::token("USDC"),
        token_one_decimals: 6,
        token_two: Address::token("EURC"),
        token_one_amount: amount,
    }
}

#[tokio::test]
async fn executes_and_publishes_only_committed_events() {
    let log = SharedLog::default();
    let service = ExchangeService::spawn(genesis(), Box::new(log.clone()), ManualClock::new(1_000));

    service
        .execute(
            alice(),
            Instruction::Approve {
                spender: Address::swap("main"),
                token: Address::token("USDC"),
                amount: UNLIMITED_ALLOWANCE,
            },
        )
        .await
        .unwrap();

    let receipt = service.execute(alice(), swap_usdc_for_eurc(10_000_000_000)).await.unwrap();
    assert_eq!(receipt.timestamp, 1_000);
    assert!(matches!(receipt.outcome, Outcome::Swapped(a) if a.net_two_amount == 19_900_000_000));

    // alice has nothing left to swap
    let err = service.execute(alice(), swap_usdc_for_eurc(1)).await.unwrap_err();
    assert!(matches!(err, Error::Exchange(ledger_swap::Error::InsufficientBalance { .. })));

    assert_eq!(log.names(), ["approval", "deposit", "withdraw", "tokens_swapped"]);

    let eurc = service
        .read(|ex| ex.balance_of(&Address::from_label("alice"), &Address::token("EURC")))
        .await
        .unwrap();
    assert_eq!(eurc, 19_900_000_000);

    let exchange = service.shutdown().await.unwrap();
    assert!(exchange.pools_consistent());
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let service = ExchangeService::spawn(genesis(), Box::new(SharedLog::default()), ManualClock::new(0));
    let usdc = Address::token("USDC");
    let stake = Address::stake("main");

    // many parallel attempts to open the same position: exactly one wins
    service
        .execute(alice(), Instruction::Approve { spender: stake, token: usdc, amount: UNLIMITED_ALLOWANCE })
        .await
        .unwrap();
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service.execute(alice(), Instruction::Stake { stake, amount: 100_000_000 }).await
        }));
    }
    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => wins += 1,
            Err(Error::Exchange(ledger_swap::Error::AlreadyStaked(who))) => assert_eq!(who, alice()),
            Err(other) => panic!("unexpected error {other}"),
        }
    }
    assert_eq!(wins, 1);

    let staked = service
        .read(move |ex| ex.stake_ledger(&stake).map(|s| (s.total_staker_count, s.total_staked_token_amount)))
        .await
        .unwrap();
    assert_eq!(staked, Some((1, 100_000_000)));
}

#[tokio::test]
async fn manual_clock_drives_time_locks() {
    let clock = ManualClock::new(100);
    let service = ExchangeService::spawn(genesis(), Box::new(SharedLog::default()), clock.clone());
    let lock = Address::lock("vesting");
    let usdc = Address::token("USDC");

    service
        .execute(alice(), Instruction::Approve { spender: lock, token: usdc, amount: 500 })
        .await
        .unwrap();
    service
        .execute(alice(), Instruction::Lock { lock, amount: 500, unlock_date: 200 })
        .await
        .unwrap();

    clock.advance(50);
    let early = service.execute(alice(), Instruction::Claim { lock }).await;
    assert!(matches!(
        early,
        Err(Error::Exchange(ledger_swap::Error::StillLocked { unlock_date: 200 }))
    ));

    clock.set(200);
    let receipt = service.execute(alice(), Instruction::Claim { lock }).await.unwrap();
    assert_eq!(receipt.outcome, Outcome::Claimed { amount: 500 });
}

#[tokio::test]
async fn closed_service_reports_closed() {
    let service = ExchangeService::spawn(genesis(), Box::new(SharedLog::default()), ManualClock::new(0));
    let handle = service.clone();
    service.shutdown().await.unwrap();

    let err = handle.execute(alice(), swap_usdc_for_eurc(1)).await.unwrap_err();
    assert!(matches!(err, Error::ServiceClosed));
}

#[test]
fn state_and_event_log_persist_to_disk() {
    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    let events_path = dir.path().join("events.jsonl");

    let exchange = genesis();
    save_state(&state_path, &exchange).unwrap();
    assert_eq!(load_state(&state_path).unwrap(), exchange);
    assert!(!dir.path().join("state.tmp").exists());

    {
        let mut sink = JsonLinesSink::append(&events_path).unwrap();
        sink.publish(&Event::SwapEnabledSet { swap: Address::swap("main"), enabled: false });
    }
    {
        let mut sink = JsonLinesSink::append(&events_path).unwrap();
        sink.publish(&Event::SwapEnabledSet { swap: Address::swap("main"), enabled: true });
    }
    let log = std::fs::read_to_string(&events_path).unwrap();
    assert_eq!(log.lines().count(), 2);

    assert!(matches!(load_state(dir.path().join("missing.json")), Err(Error::Io { .. })));
}
