//! [`ExchangeService`]: serialized access to one [`Exchange`].
//!
//! A single tokio task owns the exchange. Submissions and reads arrive over
//! an `mpsc` channel and are answered through `oneshot` replies, so every
//! instruction sees the state left by the previous one and nothing else.
//! Committed events are published to the configured [`EventSink`] in commit
//! order; rejected instructions publish nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use ledger_swap::{Address, EventSink, Exchange, Instruction, Receipt};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{Error, Result};

const QUEUE_DEPTH: usize = 64;

// ─── Clocks ──────────────────────────────────────────────────────────────────

/// Source of the timestamp stamped on each instruction.
pub trait Clock: Send + 'static {
    fn now(&self) -> u64;
}

/// Wall clock, seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

/// Shared, manually advanced clock for tests and scripted runs.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start)))
    }

    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── Service ─────────────────────────────────────────────────────────────────

type ReadJob = Box<dyn FnOnce(&Exchange) + Send>;

enum Command {
    Execute {
        caller:      Address,
        instruction: Instruction,
        reply:       oneshot::Sender<ledger_swap::Result<Receipt>>,
    },
    Read(ReadJob),
    Shutdown {
        reply: oneshot::Sender<Exchange>,
    },
}

/// Cloneable handle to the service task.
#[derive(Clone)]
pub struct ExchangeService {
    tx: mpsc::Sender<Command>,
}

impl ExchangeService {
    /// Move `exchange` into a new task on the current tokio runtime.
    pub fn spawn<C: Clock>(exchange: Exchange, sink: Box<dyn EventSink + Send>, clock: C) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(exchange, sink, clock, rx));
        Self { tx }
    }

    /// Submit one instruction and wait for it to commit or be rejected.
    pub async fn execute(&self, caller: Address, instruction: Instruction) -> Result<Receipt> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Execute { caller, instruction, reply })
            .await
            .map_err(|_| Error::ServiceClosed)?;
        Ok(rx.await.map_err(|_| Error::ServiceClosed)??)
    }

    /// Run `f` against the committed state, between two instructions.
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&Exchange) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: ReadJob = Box::new(move |exchange| {
            let _ = reply.send(f(exchange));
        });
        self.tx.send(Command::Read(job)).await.map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }

    /// Stop the task after everything already queued and hand back the state.
    pub async fn shutdown(self) -> Result<Exchange> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Shutdown { reply }).await.map_err(|_| Error::ServiceClosed)?;
        rx.await.map_err(|_| Error::ServiceClosed)
    }
}

async fn run<C: Clock>(
    mut exchange: Exchange,
    mut sink: Box<dyn EventSink + Send>,
    clock: C,
    mut rx: mpsc::Receiver<Command>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Execute { caller, instruction, reply } => {
                let result = exchange.process(caller, clock.now(), &instruction);
                if let Ok(receipt) = &result {
                    for event in &receipt.events {
                        sink.publish(event);
                    }
                }
                let _ = reply.send(result);
            }
            Command::Read(job) => job(&exchange),
            Command::Shutdown { reply } => {
                let _ = reply.send(exchange);
                return;
            }
        }
    }
    debug!("all service handles dropped");
}
