//! Server configuration, loaded from the `[server]` table of a TOML file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::verify::{RateLimitPolicy, VerificationPolicy};
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub store_path: PathBuf,
    pub tolerance: f64,
    pub max_timing_secs: f64,
    pub max_reference_index: f64,
    pub rate_limit: RateLimitPolicy,
    /// Key rate limits on the first `x-forwarded-for` hop; only safe behind a proxy that sets it
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let policy = VerificationPolicy::default();
        ServerConfig {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            store_path: PathBuf::from("leaderboard.jsonl"),
            tolerance: policy.tolerance,
            max_timing_secs: policy.max_timing_secs,
            max_reference_index: policy.max_reference_index,
            rate_limit: RateLimitPolicy::default(),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    /// Load from a TOML file; a file without `[server]` yields the defaults.
    pub fn load(path: &Path) -> BenchResult<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| BenchError::Message(format!("failed to read config: {e}")))?;
        Self::from_toml(&s)
    }

    pub fn from_toml(s: &str) -> BenchResult<Self> {
        let file: ConfigFile = toml::from_str(s)
            .map_err(|e| BenchError::Message(format!("failed to parse config: {e}")))?;
        file.server.validate()?;
        Ok(file.server)
    }

    pub fn validate(&self) -> BenchResult<()> {
        self.verification_policy().validate()?;
        if self.rate_limit.max_submissions == 0 || self.rate_limit.window_secs == 0 {
            return Err(BenchError::Message(
                "rate_limit.max_submissions and rate_limit.window_secs must be positive"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            tolerance: self.tolerance,
            max_timing_secs: self.max_timing_secs,
            max_reference_index: self.max_reference_index,
            ..VerificationPolicy::default()
        }
    }
}
