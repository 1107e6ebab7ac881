//! Blocking HTTP client for the leaderboard service.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::core::{LeaderboardRecord, SubmissionEnvelope};
use crate::storage::{LeaderboardQuery, LeaderboardStats};
use crate::verify::{Receipt, Rejection};
use crate::{BenchError, BenchResult};

const TIMEOUT_SECS: u64 = 30;

/// Client for the submission and leaderboard endpoints.
pub struct LeaderboardClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl LeaderboardClient {
    pub fn new(base_url: &str) -> BenchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| BenchError::Message(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Submit an envelope once. Rejections come back as `BenchError::Rejected`.
    pub fn submit(&self, envelope: &SubmissionEnvelope) -> BenchResult<Receipt> {
        debug!(uuid = %envelope.uuid, url = %self.base_url, "submitting results");
        let response = self
            .client
            .post(self.url("/api/submit"))
            .json(envelope)
            .send()
            .map_err(connect_error)?;
        decode(response)
    }

    pub fn leaderboard(&self, query: &LeaderboardQuery) -> BenchResult<Vec<LeaderboardRecord>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(p) = query.config_name {
            params.push(("config_name", p.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        let response = self
            .client
            .get(self.url("/api/leaderboard"))
            .query(&params)
            .send()
            .map_err(connect_error)?;
        decode(response)
    }

    pub fn stats(&self) -> BenchResult<LeaderboardStats> {
        let response = self
            .client
            .get(self.url("/api/stats"))
            .send()
            .map_err(connect_error)?;
        decode(response)
    }
}

fn connect_error(e: reqwest::Error) -> BenchError {
    BenchError::StorageUnavailable(format!("leaderboard unreachable: {e}"))
}

fn decode<T: DeserializeOwned>(response: reqwest::blocking::Response) -> BenchResult<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .map_err(|e| BenchError::Message(format!("invalid response body: {e}")));
    }

    let body: Value = response.json().unwrap_or(Value::Null);
    let error = body.get("error").cloned().unwrap_or(Value::Null);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());

    Err(match status.as_u16() {
        429 => BenchError::RateLimited {
            client: error
                .get("client")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            retry_after_secs: error
                .get("retry_after_secs")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        },
        503 => BenchError::StorageUnavailable(message),
        _ => match serde_json::from_value::<Rejection>(error) {
            Ok(rejection) => BenchError::Rejected(rejection),
            Err(_) => BenchError::Message(format!("server returned {status}: {message}")),
        },
    })
}
