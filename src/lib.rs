pub mod history_cmd;
pub mod leaderboard_cmd;
pub mod run_cmd;
pub mod serve_cmd;
pub mod verify_cmd;

pub mod bench;
pub mod client;
pub mod core;
pub mod score;
pub mod server;
pub mod storage;
pub mod verify;

use thiserror::Error;

pub use verify::{Rejection, Stage};

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("{0}")]
    Message(String),
    /// A workload failed during a timed run; partial samples are discarded.
    #[error("measurement failed for {benchmark}: {reason}")]
    Measurement { benchmark: String, reason: String },
    /// Expected absence of optional hardware or library support.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),
    #[error("submission rejected: {0}")]
    Rejected(#[from] Rejection),
    #[error("rate limit exceeded for {client}; retry in {retry_after_secs}s")]
    RateLimited { client: String, retry_after_secs: u64 },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BenchError {
    /// Infrastructure errors are the only class a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BenchError::StorageUnavailable(_) | BenchError::RateLimited { .. }
        )
    }

    pub fn measurement(benchmark: impl Into<String>, reason: impl ToString) -> Self {
        BenchError::Measurement {
            benchmark: benchmark.into(),
            reason: reason.to_string(),
        }
    }
}

pub type BenchResult<T> = Result<T, BenchError>;
