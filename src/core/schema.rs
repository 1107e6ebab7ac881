//! Envelope schema v1 - the records exchanged between the benchmark client,
//! the verification gateway and the leaderboard store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Schema version of persisted leaderboard records
pub const SCHEMA_VERSION: u32 = 1;

/// RFC 3339 timestamp for "now" in UTC.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// Lowercase hyphenated form of a uuid written in any accepted notation
/// (simple, hyphenated, braced, `urn:uuid:`), or `None` if it does not parse.
pub fn canonical_uuid(s: &str) -> Option<String> {
    uuid::Uuid::parse_str(s.trim())
        .ok()
        .map(|u| u.hyphenated().to_string())
}

/// Benchmark categories, in the order the runner executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Cpu,
    Memory,
    Gpu,
    Disk,
    Ml,
    Plot,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Cpu,
        Category::Memory,
        Category::Gpu,
        Category::Disk,
        Category::Ml,
        Category::Plot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cpu => "cpu",
            Category::Memory => "memory",
            Category::Gpu => "gpu",
            Category::Disk => "disk",
            Category::Ml => "ml",
            Category::Plot => "plot",
        }
    }

    /// Categories whose absence depends on the host (no GPU backend, missing
    /// optional library) and degrade to a zero bag instead of aborting a run.
    pub fn is_environment_dependent(&self) -> bool {
        matches!(self, Category::Gpu | Category::Ml)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named configuration profile tag. Partitions the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileName {
    Light,
    #[default]
    Standard,
    Heavy,
}

impl ProfileName {
    pub const ALL: [ProfileName; 3] = [ProfileName::Light, ProfileName::Standard, ProfileName::Heavy];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Light => "light",
            ProfileName::Standard => "standard",
            ProfileName::Heavy => "heavy",
        }
    }

    /// Resolve a tag, falling back to the default profile when absent or unknown.
    pub fn from_tag_or_default(tag: Option<&str>) -> Self {
        tag.and_then(|t| t.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ProfileName::Light),
            "standard" => Ok(ProfileName::Standard),
            "heavy" => Ok(ProfileName::Heavy),
            other => Err(format!(
                "unknown profile '{other}' (expected light, standard or heavy)"
            )),
        }
    }
}

fn profile_or_default<'de, D>(deserializer: D) -> Result<ProfileName, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(ProfileName::from_tag_or_default(
        raw.as_ref().and_then(|v| v.as_str()),
    ))
}

/// A single measurement leaf, or a nested bag for multi-metric categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Nested(ResultBag),
    /// Serialised as `null`; scored as unmeasured.
    Unmeasured,
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<ResultBag> for MetricValue {
    fn from(bag: ResultBag) -> Self {
        MetricValue::Nested(bag)
    }
}

/// Named measurements produced by one benchmark category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultBag(BTreeMap<String, MetricValue>);

impl ResultBag {
    pub fn new() -> Self {
        ResultBag(BTreeMap::new())
    }

    /// Bag reporting every named metric as `0` (unmeasured).
    pub fn unavailable<I, S>(metric_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        metric_names.into_iter().map(|name| (name, 0.0)).collect()
    }

    /// Insert a metric, returning the value it replaced (last write wins).
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<MetricValue>,
    ) -> Option<MetricValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.0.get(name)
    }

    /// Numeric leaf stored directly under `name`.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(MetricValue::as_f64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every numeric leaf is zero or unmeasured.
    pub fn is_all_zero(&self) -> bool {
        self.0.values().all(|v| match v {
            MetricValue::Number(n) => *n == 0.0,
            MetricValue::Nested(inner) => inner.is_all_zero(),
            MetricValue::Unmeasured => true,
        })
    }
}

impl<K: Into<String>, V: Into<MetricValue>> FromIterator<(K, V)> for ResultBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ResultBag(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One ResultBag per category, unscored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResults {
    pub cpu: ResultBag,
    pub memory: ResultBag,
    pub gpu: ResultBag,
    pub disk: ResultBag,
    pub ml: ResultBag,
    pub plot: ResultBag,
}

impl BenchmarkResults {
    pub fn bag(&self, category: Category) -> &ResultBag {
        match category {
            Category::Cpu => &self.cpu,
            Category::Memory => &self.memory,
            Category::Gpu => &self.gpu,
            Category::Disk => &self.disk,
            Category::Ml => &self.ml,
            Category::Plot => &self.plot,
        }
    }

    pub fn bag_mut(&mut self, category: Category) -> &mut ResultBag {
        match category {
            Category::Cpu => &mut self.cpu,
            Category::Memory => &mut self.memory,
            Category::Gpu => &mut self.gpu,
            Category::Disk => &mut self.disk,
            Category::Ml => &mut self.ml,
            Category::Plot => &mut self.plot,
        }
    }
}

/// Client-built record of one benchmark run, submitted once to the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    /// Free-form hardware descriptor
    pub system_info: Value,

    #[serde(flatten)]
    pub results: BenchmarkResults,

    /// Index computed by the client
    pub reference_index: f64,

    #[serde(default, deserialize_with = "profile_or_default")]
    pub config_name: ProfileName,

    /// Client-generated identifier, unique across the store
    pub uuid: String,

    /// ISO 8601 timestamp of the run
    pub timestamp: String,
}

impl SubmissionEnvelope {
    /// Build an envelope for a fresh run with a new v4 uuid and the current time.
    pub fn new(
        system_info: Value,
        results: BenchmarkResults,
        reference_index: f64,
        config_name: ProfileName,
    ) -> Self {
        SubmissionEnvelope {
            system_info,
            results,
            reference_index,
            config_name,
            uuid: uuid::Uuid::new_v4().to_string(),
            timestamp: now_rfc3339(),
        }
    }
}

/// An envelope that passed verification, ready for the store to assign an id.
#[derive(Debug, Clone)]
pub struct AcceptedSubmission {
    pub envelope: SubmissionEnvelope,
    /// Index recomputed by the server; the only value ever persisted as `reference_index`
    pub server_score: f64,
    pub scoring_version: u32,
}

impl AcceptedSubmission {
    pub fn into_record(self, id: u64) -> LeaderboardRecord {
        let AcceptedSubmission {
            envelope,
            server_score,
            scoring_version,
        } = self;
        LeaderboardRecord {
            schema_version: SCHEMA_VERSION,
            id,
            uuid: envelope.uuid,
            config_name: envelope.config_name,
            reference_index: server_score,
            declared_index: envelope.reference_index,
            scoring_version,
            timestamp: envelope.timestamp,
            received_at: now_rfc3339(),
            system_info: envelope.system_info,
            results: envelope.results,
        }
    }
}

/// Persisted form of an accepted envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub schema_version: u32,

    /// Store-assigned, monotonically increasing
    pub id: u64,

    pub uuid: String,

    pub config_name: ProfileName,

    /// Server-computed index
    pub reference_index: f64,

    /// Index the client declared, kept for audit
    pub declared_index: f64,

    pub scoring_version: u32,

    /// Client run timestamp
    pub timestamp: String,

    /// Server acceptance timestamp
    pub received_at: String,

    pub system_info: Value,

    #[serde(flatten)]
    pub results: BenchmarkResults,
}

/// Statistics over a set of per-run samples, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStat {
    pub iterations: u32,
    pub mean_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stddev_s: Option<f64>,
    pub min_s: f64,
    pub max_s: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_s: Option<f64>,
}

impl TimingStat {
    /// Create TimingStat from a slice of sample times in seconds
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return TimingStat {
                iterations: 0,
                mean_s: 0.0,
                median_s: None,
                stddev_s: None,
                min_s: 0.0,
                max_s: 0.0,
                p95_s: None,
            };
        }

        let iterations = n as u32;
        let sum: f64 = samples.iter().sum();
        let mean_s = sum / n as f64;

        let min_s = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_s = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let variance: f64 = samples.iter().map(|x| (x - mean_s).powi(2)).sum::<f64>() / n as f64;
        let stddev_s = Some(variance.sqrt());

        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let median_s = if n % 2 == 0 {
            Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
        } else {
            Some(sorted[n / 2])
        };

        // p95: index = ceil(0.95 * n) - 1, clamped
        let p95_idx = ((0.95 * n as f64).ceil() as usize)
            .saturating_sub(1)
            .min(n - 1);
        let p95_s = Some(sorted[p95_idx]);

        TimingStat {
            iterations,
            mean_s,
            median_s,
            stddev_s,
            min_s,
            max_s,
            p95_s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_envelope_json() -> Value {
        json!({
            "system_info": {"os": "Linux"},
            "cpu": {"calculate_primes": 0.5, "parallel_processing": 0.2},
            "memory": {"bandwidth": 0.25},
            "gpu": {"tensor_operations": 0.0, "tiny_training_loop": 0.0},
            "disk": {"write_time": 0.1, "read_time": 0.05},
            "ml": {"timings": {"create_dataset": 0.01, "train_model": 0.3}, "model_accuracy": 0.91},
            "plot": {"generate_scatter_plot": 0.02},
            "reference_index": 1800.0,
            "config_name": "heavy",
            "uuid": "0b6f0a44-8a39-4c0e-b0c5-1b9b7f4a8d21",
            "timestamp": "2025-01-01T12:00:00Z"
        })
    }

    #[test]
    fn test_timing_stat_from_samples() {
        let stat = TimingStat::from_samples(&[1.0, 1.1, 1.05, 1.15, 1.2]);

        assert_eq!(stat.iterations, 5);
        assert!((stat.mean_s - 1.1).abs() < 1e-9);
        assert_eq!(stat.min_s, 1.0);
        assert_eq!(stat.max_s, 1.2);
        assert_eq!(stat.median_s, Some(1.1));
        assert_eq!(stat.p95_s, Some(1.2));
    }

    #[test]
    fn test_timing_stat_empty_samples() {
        let stat = TimingStat::from_samples(&[]);

        assert_eq!(stat.iterations, 0);
        assert_eq!(stat.mean_s, 0.0);
        assert!(stat.median_s.is_none());
    }

    #[test]
    fn test_timing_stat_even_median() {
        let stat = TimingStat::from_samples(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(stat.median_s, Some(2.5));
        assert_eq!(stat.stddev_s.map(|s| (s * 1000.0).round()), Some(1118.0));
    }

    #[test]
    fn test_envelope_parses_nested_ml_bag() {
        let envelope: SubmissionEnvelope = serde_json::from_value(sample_envelope_json()).unwrap();

        assert_eq!(envelope.config_name, ProfileName::Heavy);
        assert_eq!(envelope.results.cpu.number("calculate_primes"), Some(0.5));
        match envelope.results.ml.get("timings") {
            Some(MetricValue::Nested(inner)) => assert_eq!(inner.number("train_model"), Some(0.3)),
            other => panic!("expected nested timings, got {other:?}"),
        }
        assert_eq!(envelope.results.ml.number("model_accuracy"), Some(0.91));
    }

    #[test]
    fn test_envelope_defaults_missing_or_unknown_profile() {
        let mut raw = sample_envelope_json();
        raw.as_object_mut().unwrap().remove("config_name");
        let envelope: SubmissionEnvelope = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(envelope.config_name, ProfileName::Standard);

        raw["config_name"] = json!("ultra");
        let envelope: SubmissionEnvelope = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(envelope.config_name, ProfileName::Standard);

        raw["config_name"] = json!(42);
        let envelope: SubmissionEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.config_name, ProfileName::Standard);
    }

    #[test]
    fn test_envelope_requires_category_bags() {
        let mut raw = sample_envelope_json();
        raw.as_object_mut().unwrap().remove("memory");
        let err = serde_json::from_value::<SubmissionEnvelope>(raw).unwrap_err();
        assert!(err.to_string().contains("memory"));
    }

    #[test]
    fn test_null_metric_is_unmeasured() {
        let bag: ResultBag = serde_json::from_value(json!({"allocation": null})).unwrap();
        assert_eq!(bag.get("allocation"), Some(&MetricValue::Unmeasured));
        assert_eq!(bag.number("allocation"), None);
        assert!(bag.is_all_zero());
    }

    #[test]
    fn test_result_bag_insert_overwrites() {
        let mut bag = ResultBag::new();
        assert!(bag.insert("write_time", 1.0).is_none());
        assert_eq!(bag.insert("write_time", 2.0), Some(MetricValue::Number(1.0)));
        assert_eq!(bag.number("write_time"), Some(2.0));
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn test_unavailable_bag_is_all_zero() {
        let bag = ResultBag::unavailable(["tensor_operations", "tiny_training_loop"]);
        assert_eq!(bag.len(), 2);
        assert_eq!(bag.number("tensor_operations"), Some(0.0));
        assert!(bag.is_all_zero());
    }

    #[test]
    fn test_accepted_submission_persists_server_score() {
        let envelope: SubmissionEnvelope = serde_json::from_value(sample_envelope_json()).unwrap();
        let record = AcceptedSubmission {
            envelope,
            server_score: 1799.5,
            scoring_version: 2,
        }
        .into_record(7);

        assert_eq!(record.id, 7);
        assert_eq!(record.reference_index, 1799.5);
        assert_eq!(record.declared_index, 1800.0);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(!record.received_at.is_empty());
    }

    #[test]
    fn test_profile_name_parse() {
        assert_eq!("HEAVY".parse::<ProfileName>(), Ok(ProfileName::Heavy));
        assert!("medium".parse::<ProfileName>().is_err());
        assert_eq!(ProfileName::from_tag_or_default(None), ProfileName::Standard);
    }
}
