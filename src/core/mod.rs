//! Core types and schemas for bench_hub.
//!
//! This module contains the envelope and record schema shared by the client,
//! the verification gateway and the leaderboard store.

pub mod env;
pub mod schema;

// Re-export key types for convenience
pub use env::{SystemInfo, anonymise};
pub use schema::{
    AcceptedSubmission, BenchmarkResults, Category, LeaderboardRecord, MetricValue, ProfileName,
    ResultBag, SCHEMA_VERSION, SubmissionEnvelope, TimingStat, canonical_uuid, now_rfc3339,
};
