//! SDK error type.

use std::path::PathBuf;

/// All errors returned by the Ledger-Swap SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Exchange ─────────────────────────────────────────────────────────────
    /// The accounting core rejected an instruction; nothing was committed.
    #[error("Instruction rejected: {0}")]
    Exchange(#[from] ledger_swap::Error),

    // ── Persistence ──────────────────────────────────────────────────────────
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Deployment config ────────────────────────────────────────────────────
    #[error("Invalid config: {0}")]
    Config(String),

    // ── Service ──────────────────────────────────────────────────────────────
    /// The service task has stopped and no longer accepts requests.
    #[error("Exchange service is closed")]
    ServiceClosed,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;
