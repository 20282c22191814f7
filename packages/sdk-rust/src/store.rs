//! State snapshots and the JSON-lines event log.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use ledger_swap::{Event, EventSink, Exchange};
use tracing::warn;

use crate::error::{Error, Result};

/// Read a snapshot written by [`save_state`].
pub fn load_state(path: impl AsRef<Path>) -> Result<Exchange> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write the whole exchange as pretty JSON.
///
/// The snapshot goes to a sibling `.tmp` file first and is renamed over the
/// target, so a crash never leaves a half-written state file behind.
pub fn save_state(path: impl AsRef<Path>, exchange: &Exchange) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(exchange)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| Error::io(path, e))
}

/// Appends one JSON object per committed event.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn publish(&mut self, event: &Event) {
        // the event is already committed; a write failure can only be reported
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush());
        if let Err(err) = written {
            warn!(event = event.name(), %err, "failed to append event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_swap::Address;

    #[test]
    fn writes_one_event_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let pool = Address::pool("usdc");
        sink.publish(&Event::DepositingEnabledSet { pool, enabled: false });
        sink.publish(&Event::Deposit { pool, depositor: Address::from_label("alice"), amount: 5 });

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "deposit");
        assert_eq!(second["amount"], 5);
    }
}
