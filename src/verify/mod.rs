//! Submission verification.
//!
//! Stages run in a fixed order and stop at the first rejection:
//! structural checks, declared-index plausibility, server-side recomputation
//! with a relative tolerance check. Uniqueness is enforced by the store on
//! insert. Nothing here touches shared state.

pub mod gateway;
pub mod rate_limit;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::core::{
    AcceptedSubmission, MetricValue, ResultBag, SubmissionEnvelope, canonical_uuid,
};
use crate::score::{CURRENT_SCHEME, ScoringScheme};
use crate::{BenchError, BenchResult};

pub use gateway::{Gateway, Receipt};
pub use rate_limit::{RateLimitPolicy, RateLimiter};

/// Envelope keys that must be present before the payload is decoded.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "system_info",
    "cpu",
    "memory",
    "gpu",
    "disk",
    "ml",
    "plot",
    "reference_index",
    "uuid",
    "timestamp",
];

/// Verification stage that rejected a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Structural,
    Plausibility,
    Tolerance,
    Uniqueness,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Structural => "structural",
            Stage::Plausibility => "plausibility",
            Stage::Tolerance => "tolerance",
            Stage::Uniqueness => "uniqueness",
        })
    }
}

/// Why a submission was refused. Serialised verbatim into HTTP error bodies.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("invalid field {field}: {reason}")]
    Structural { field: String, reason: String },

    #[error("implausible reference_index {declared}: {reason}")]
    Implausible { declared: f64, reason: String },

    #[error(
        "score mismatch: declared {declared}, recomputed {recomputed} (tolerance {tolerance})"
    )]
    ScoreMismatch {
        declared: f64,
        recomputed: f64,
        tolerance: f64,
    },

    /// Server recomputation produced no usable score.
    #[error("submission cannot be scored: {reason}")]
    Unscorable { reason: String },

    #[error("uuid {uuid} already submitted")]
    DuplicateUuid { uuid: String },
}

impl Rejection {
    pub fn stage(&self) -> Stage {
        match self {
            Rejection::Structural { .. } => Stage::Structural,
            Rejection::Implausible { .. } => Stage::Plausibility,
            Rejection::ScoreMismatch { .. } | Rejection::Unscorable { .. } => Stage::Tolerance,
            Rejection::DuplicateUuid { .. } => Stage::Uniqueness,
        }
    }

    fn structural(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Rejection::Structural {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Bounds and tolerance the gateway enforces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationPolicy {
    /// Maximum relative deviation between declared and recomputed index
    pub tolerance: f64,
    /// Ceiling for any single timing, in seconds
    pub max_timing_secs: f64,
    /// Ceiling for the declared index
    pub max_reference_index: f64,
    pub scheme: ScoringScheme,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        VerificationPolicy {
            tolerance: 0.05,
            max_timing_secs: 3600.0,
            max_reference_index: 10_000_000.0,
            scheme: CURRENT_SCHEME,
        }
    }
}

impl VerificationPolicy {
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Tolerance must lie in (0, 1) and both ceilings must be positive; NaN fails every bound.
    pub fn validate(&self) -> BenchResult<()> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(BenchError::Message(format!(
                "tolerance must be in (0, 1), got {}",
                self.tolerance
            )));
        }
        if !(self.max_timing_secs > 0.0) || !(self.max_reference_index > 0.0) {
            return Err(BenchError::Message(
                "max_timing_secs and max_reference_index must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Decode a raw payload, naming the first missing required field.
pub fn parse_envelope(raw: Value) -> Result<SubmissionEnvelope, Rejection> {
    let Some(object) = raw.as_object() else {
        return Err(Rejection::structural("body", "expected a JSON object"));
    };
    if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !object.contains_key(**f)) {
        return Err(Rejection::structural(*missing, "required field is missing"));
    }
    serde_json::from_value(raw).map_err(|e| Rejection::structural("body", e.to_string()))
}

/// Run the structural, plausibility and tolerance stages.
///
/// On success the returned submission carries the server-computed index and
/// the uuid in canonical form.
pub fn verify_submission(
    mut envelope: SubmissionEnvelope,
    policy: &VerificationPolicy,
) -> Result<AcceptedSubmission, Rejection> {
    check_structure(&envelope, policy)?;
    envelope.uuid = canonical_uuid(&envelope.uuid)
        .ok_or_else(|| Rejection::structural("uuid", "not a valid UUID"))?;
    check_plausibility(envelope.reference_index, policy)?;

    let server_score = policy.scheme.score(&envelope.results).reference_index;
    check_tolerance(envelope.reference_index, server_score, policy.tolerance)?;

    Ok(AcceptedSubmission {
        envelope,
        server_score,
        scoring_version: policy.scheme.version,
    })
}

pub fn check_structure(
    envelope: &SubmissionEnvelope,
    policy: &VerificationPolicy,
) -> Result<(), Rejection> {
    if envelope.uuid.trim().is_empty() {
        return Err(Rejection::structural("uuid", "must not be empty"));
    }
    if canonical_uuid(&envelope.uuid).is_none() {
        return Err(Rejection::structural("uuid", "not a valid UUID"));
    }
    if !is_iso8601(&envelope.timestamp) {
        return Err(Rejection::structural(
            "timestamp",
            format!("'{}' is not an ISO 8601 timestamp", envelope.timestamp),
        ));
    }
    check_timings("cpu", &envelope.results.cpu, policy.max_timing_secs)?;
    check_timings("memory", &envelope.results.memory, policy.max_timing_secs)?;
    check_timings("gpu", &envelope.results.gpu, policy.max_timing_secs)
}

fn is_iso8601(s: &str) -> bool {
    OffsetDateTime::parse(s, &Rfc3339).is_ok()
        || OffsetDateTime::parse(s, &Iso8601::DEFAULT).is_ok()
        || PrimitiveDateTime::parse(s, &Iso8601::DEFAULT).is_ok()
}

fn check_timings(path: &str, bag: &ResultBag, ceiling: f64) -> Result<(), Rejection> {
    for (name, value) in bag.iter() {
        let field = format!("{path}.{name}");
        match value {
            MetricValue::Number(v) => {
                if !v.is_finite() {
                    return Err(Rejection::structural(field, "must be a finite number"));
                }
                if *v < 0.0 {
                    return Err(Rejection::structural(field, format!("{v} is negative")));
                }
                if *v > ceiling {
                    return Err(Rejection::structural(
                        field,
                        format!("{v} exceeds the {ceiling}s ceiling"),
                    ));
                }
            }
            MetricValue::Nested(inner) => check_timings(&field, inner, ceiling)?,
            MetricValue::Unmeasured => {}
        }
    }
    Ok(())
}

pub fn check_plausibility(declared: f64, policy: &VerificationPolicy) -> Result<(), Rejection> {
    let reason = if !declared.is_finite() {
        "must be a finite number".to_string()
    } else if declared <= 0.0 {
        "must be positive".to_string()
    } else if declared > policy.max_reference_index {
        format!("exceeds the ceiling of {}", policy.max_reference_index)
    } else {
        return Ok(());
    };
    Err(Rejection::Implausible { declared, reason })
}

pub fn check_tolerance(declared: f64, server_score: f64, tolerance: f64) -> Result<(), Rejection> {
    if !server_score.is_finite() || server_score <= 0.0 {
        return Err(Rejection::Unscorable {
            reason: format!(
                "recomputed index is {server_score}; cpu, gpu and memory timings are all unmeasured"
            ),
        });
    }
    let deviation = (declared - server_score).abs() / server_score;
    if deviation > tolerance {
        return Err(Rejection::ScoreMismatch {
            declared,
            recomputed: server_score,
            tolerance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BenchmarkResults, ProfileName};
    use serde_json::json;

    fn results() -> BenchmarkResults {
        BenchmarkResults {
            cpu: [("calculate_primes", 0.5)].into_iter().collect(),
            memory: [("bandwidth", 0.25)].into_iter().collect(),
            gpu: [("tensor_operations", 0.0)].into_iter().collect(),
            ..Default::default()
        }
    }

    fn envelope(declared: f64) -> SubmissionEnvelope {
        SubmissionEnvelope::new(json!({}), results(), declared, ProfileName::Standard)
    }

    fn correct_index() -> f64 {
        CURRENT_SCHEME.score(&results()).reference_index
    }

    #[test]
    fn test_correct_declaration_is_accepted_with_server_score() {
        let declared = correct_index() * 1.01;
        let accepted = verify_submission(envelope(declared), &VerificationPolicy::default()).unwrap();
        assert_eq!(accepted.server_score, correct_index());
        assert_eq!(accepted.envelope.reference_index, declared);
        assert_eq!(accepted.scoring_version, CURRENT_SCHEME.version);
    }

    #[test]
    fn test_inflated_declaration_reports_both_values() {
        let s = correct_index();
        let err = verify_submission(envelope(s * 1.2), &VerificationPolicy::default()).unwrap_err();
        match err {
            Rejection::ScoreMismatch {
                declared,
                recomputed,
                tolerance,
            } => {
                assert_eq!(declared, s * 1.2);
                assert_eq!(recomputed, s);
                assert_eq!(tolerance, 0.05);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_index_rejected_before_recomputation() {
        // empty bags would be unscorable if recomputation ran
        let env = SubmissionEnvelope::new(
            json!({}),
            BenchmarkResults::default(),
            -5.0,
            ProfileName::Standard,
        );
        let err = verify_submission(env, &VerificationPolicy::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Plausibility);
        assert!(matches!(err, Rejection::Implausible { declared, .. } if declared == -5.0));
    }

    #[test]
    fn test_ceiling_on_declared_index() {
        let err = check_plausibility(1e8, &VerificationPolicy::default()).unwrap_err();
        assert_eq!(err.stage(), Stage::Plausibility);
        assert!(check_plausibility(1e7, &VerificationPolicy::default()).is_ok());
    }

    #[test]
    fn test_zero_server_score_is_validation_failure() {
        let err = check_tolerance(100.0, 0.0, 0.05).unwrap_err();
        assert!(matches!(err, Rejection::Unscorable { .. }));
        assert_eq!(err.stage(), Stage::Tolerance);
    }

    #[test]
    fn test_timing_over_ceiling_names_field() {
        let mut env = envelope(correct_index());
        env.results.cpu.insert("calculate_primes", 7200.0);
        let err = verify_submission(env, &VerificationPolicy::default()).unwrap_err();
        match err {
            Rejection::Structural { field, .. } => assert_eq!(field, "cpu.calculate_primes"),
            other => panic!("expected structural, got {other:?}"),
        }
    }

    #[test]
    fn test_nested_leaves_are_checked() {
        let mut env = envelope(correct_index());
        let nested: ResultBag = [("copy", -1.0)].into_iter().collect();
        env.results.memory.insert("timings", nested);
        let err = check_structure(&env, &VerificationPolicy::default()).unwrap_err();
        assert!(matches!(err, Rejection::Structural { ref field, .. } if field == "memory.timings.copy"));
    }

    #[test]
    fn test_bad_uuid_and_timestamp() {
        let policy = VerificationPolicy::default();
        let mut env = envelope(correct_index());
        env.uuid = "not-a-uuid".into();
        assert!(matches!(
            check_structure(&env, &policy),
            Err(Rejection::Structural { ref field, .. }) if field == "uuid"
        ));

        let mut env = envelope(correct_index());
        env.timestamp = "yesterday".into();
        assert!(matches!(
            check_structure(&env, &policy),
            Err(Rejection::Structural { ref field, .. }) if field == "timestamp"
        ));

        env.timestamp = "2025-03-01T10:15:30.123456".into();
        assert!(check_structure(&env, &policy).is_ok());
    }

    #[test]
    fn test_policy_bounds() {
        assert!(VerificationPolicy::default().validate().is_ok());
        for t in [0.0, 1.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(VerificationPolicy::default().with_tolerance(t).validate().is_err());
        }
        let policy = VerificationPolicy {
            max_timing_secs: f64::NAN,
            ..VerificationPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_accepted_uuid_is_canonical() {
        let mut env = envelope(correct_index());
        let uuid = env.uuid.clone();
        env.uuid = format!("{{{}}}", uuid.to_uppercase());
        let accepted = verify_submission(env, &VerificationPolicy::default()).unwrap();
        assert_eq!(accepted.envelope.uuid, uuid);
    }

    #[test]
    fn test_parse_envelope_names_missing_field() {
        let mut raw = serde_json::to_value(envelope(1.0)).unwrap();
        raw.as_object_mut().unwrap().remove("gpu");
        let err = parse_envelope(raw).unwrap_err();
        assert_eq!(err, Rejection::structural("gpu", "required field is missing"));

        let err = parse_envelope(json!([1, 2])).unwrap_err();
        assert_eq!(err.stage(), Stage::Structural);
    }

    #[test]
    fn test_rejection_json_is_tagged() {
        let value = serde_json::to_value(Rejection::DuplicateUuid { uuid: "abc".into() }).unwrap();
        assert_eq!(value, json!({"kind": "duplicate_uuid", "uuid": "abc"}));
        let back: Rejection = serde_json::from_value(value).unwrap();
        assert_eq!(back.stage(), Stage::Uniqueness);
    }
}
