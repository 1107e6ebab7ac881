//! Verification gateway: admission control, verification and persistence.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::core::SubmissionEnvelope;
use crate::storage::LeaderboardStore;
use crate::{BenchError, BenchResult};

use super::rate_limit::RateLimiter;
use super::{Rejection, VerificationPolicy, parse_envelope, verify_submission};

/// Successful submission response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: u64,
    pub uuid: String,
    /// Server-computed index, as persisted
    pub reference_index: f64,
}

/// Server-side entry point for submissions.
///
/// Each call is independent: the only shared state is the store, which
/// enforces uuid uniqueness on insert, and the per-source rate limiter.
pub struct Gateway {
    store: Arc<dyn LeaderboardStore>,
    policy: VerificationPolicy,
    limiter: Option<RateLimiter>,
}

impl Gateway {
    pub fn new(store: Arc<dyn LeaderboardStore>, policy: VerificationPolicy) -> Self {
        Gateway {
            store,
            policy,
            limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn LeaderboardStore> {
        &self.store
    }

    /// Forget rate-limit windows that have expired.
    pub fn prune_rate_limits(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.prune(Instant::now());
        }
    }

    /// Decode and submit a raw JSON payload.
    pub fn submit_json(&self, source: &str, raw: Value) -> BenchResult<Receipt> {
        self.admit(source)?;
        let envelope = parse_envelope(raw).inspect_err(|r| log_rejection(source, r))?;
        self.accept(source, envelope)
    }

    /// Submit a decoded envelope.
    pub fn submit(&self, source: &str, envelope: SubmissionEnvelope) -> BenchResult<Receipt> {
        self.admit(source)?;
        self.accept(source, envelope)
    }

    fn admit(&self, source: &str) -> BenchResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        limiter.check(source, Instant::now()).map_err(|retry_after| {
            warn!(source, retry_after_secs = retry_after.as_secs(), "rate limited");
            BenchError::RateLimited {
                client: source.to_string(),
                retry_after_secs: retry_after.as_secs().max(1),
            }
        })
    }

    fn accept(&self, source: &str, envelope: SubmissionEnvelope) -> BenchResult<Receipt> {
        let accepted =
            verify_submission(envelope, &self.policy).inspect_err(|r| log_rejection(source, r))?;

        let uuid = accepted.envelope.uuid.clone();
        let config_name = accepted.envelope.config_name;
        let reference_index = accepted.server_score;

        let id = self.store.insert(accepted).inspect_err(|e| {
            if let BenchError::Rejected(r) = e {
                log_rejection(source, r);
            }
        })?;

        if let Some(limiter) = &self.limiter {
            limiter.record(source, Instant::now());
        }
        info!(id, %uuid, %config_name, reference_index, "accepted submission");

        Ok(Receipt {
            id,
            uuid,
            reference_index,
        })
    }
}

fn log_rejection(source: &str, rejection: &Rejection) {
    warn!(source, stage = %rejection.stage(), reason = %rejection, "rejected submission");
}
