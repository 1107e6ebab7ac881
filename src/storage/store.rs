//! Leaderboard store contract, ranking and statistics.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::core::{AcceptedSubmission, LeaderboardRecord, ProfileName, canonical_uuid};
use crate::verify::Rejection;
use crate::{BenchError, BenchResult};

/// Filter and truncation applied to a ranked query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    pub config_name: Option<ProfileName>,
    pub limit: Option<usize>,
}

impl LeaderboardQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn profile(config_name: ProfileName) -> Self {
        LeaderboardQuery {
            config_name: Some(config_name),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Durable, append-only table of accepted submissions.
///
/// `insert` assigns a monotonically increasing id and enforces uuid
/// uniqueness atomically with the append. Records are never mutated.
pub trait LeaderboardStore: Send + Sync {
    /// Persist an accepted submission and return its id.
    ///
    /// Fails with `Rejected(DuplicateUuid)` or `StorageUnavailable`.
    fn insert(&self, submission: AcceptedSubmission) -> BenchResult<u64>;

    /// Records ordered by `reference_index` descending, ties by ascending id.
    fn query(&self, query: &LeaderboardQuery) -> BenchResult<Vec<LeaderboardRecord>>;

    fn count(&self) -> BenchResult<usize>;

    fn stats(&self) -> BenchResult<LeaderboardStats> {
        Ok(LeaderboardStats::from_records(
            &self.query(&LeaderboardQuery::all())?,
        ))
    }
}

/// Sort in leaderboard order: index descending, then id ascending.
pub fn rank(records: &mut [LeaderboardRecord]) {
    records.sort_by(|a, b| {
        b.reference_index
            .total_cmp(&a.reference_index)
            .then(a.id.cmp(&b.id))
    });
}

/// Filter, rank and truncate.
pub fn select<'a, I>(records: I, query: &LeaderboardQuery) -> Vec<LeaderboardRecord>
where
    I: IntoIterator<Item = &'a LeaderboardRecord>,
{
    let mut out: Vec<LeaderboardRecord> = records
        .into_iter()
        .filter(|r| query.config_name.is_none_or(|p| r.config_name == p))
        .cloned()
        .collect();
    rank(&mut out);
    if let Some(limit) = query.limit {
        out.truncate(limit);
    }
    out
}

/// Uniqueness key: the canonical uuid, or the raw string for records that
/// predate canonicalisation and do not parse.
fn uuid_key(uuid: &str) -> String {
    canonical_uuid(uuid).unwrap_or_else(|| uuid.to_string())
}

/// In-memory record table shared by the store implementations.
#[derive(Debug, Default)]
pub(crate) struct Table {
    records: Vec<LeaderboardRecord>,
    uuids: HashSet<String>,
    next_id: u64,
}

impl Table {
    pub(crate) fn new() -> Self {
        Table {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Rebuild from previously persisted records.
    pub(crate) fn from_records(records: Vec<LeaderboardRecord>) -> BenchResult<Self> {
        let mut table = Table::new();
        for record in records {
            if !table.uuids.insert(uuid_key(&record.uuid)) {
                return Err(BenchError::StorageUnavailable(format!(
                    "duplicate uuid {} in persisted records",
                    record.uuid
                )));
            }
            table.next_id = table.next_id.max(record.id + 1);
            table.records.push(record);
        }
        Ok(table)
    }

    /// Assign the next id, checking uniqueness. Nothing is stored until `commit`.
    pub(crate) fn prepare(&self, submission: AcceptedSubmission) -> BenchResult<LeaderboardRecord> {
        if self.uuids.contains(&uuid_key(&submission.envelope.uuid)) {
            return Err(Rejection::DuplicateUuid {
                uuid: submission.envelope.uuid,
            }
            .into());
        }
        Ok(submission.into_record(self.next_id))
    }

    pub(crate) fn commit(&mut self, record: LeaderboardRecord) -> u64 {
        let id = record.id;
        self.next_id = id + 1;
        self.uuids.insert(uuid_key(&record.uuid));
        self.records.push(record);
        id
    }

    pub(crate) fn records(&self) -> &[LeaderboardRecord] {
        &self.records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

pub(crate) fn poisoned<T>(_: T) -> BenchError {
    BenchError::StorageUnavailable("store lock poisoned".to_string())
}

/// Non-durable store; the default for tests and offline use.
#[derive(Debug)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            table: RwLock::new(Table::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderboardStore for MemoryStore {
    fn insert(&self, submission: AcceptedSubmission) -> BenchResult<u64> {
        let mut table = self.table.write().map_err(poisoned)?;
        let record = table.prepare(submission)?;
        Ok(table.commit(record))
    }

    fn query(&self, query: &LeaderboardQuery) -> BenchResult<Vec<LeaderboardRecord>> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(select(table.records(), query))
    }

    fn count(&self) -> BenchResult<usize> {
        Ok(self.table.read().map_err(poisoned)?.len())
    }
}

/// Score-distribution buckets, lowest first.
pub const SCORE_BUCKETS: [&str; 6] = ["zero", "<100", "100-500", "500-1000", "1K-10K", ">10K"];

fn bucket_of(index: f64) -> usize {
    match index {
        i if i <= 0.0 => 0,
        i if i < 100.0 => 1,
        i if i < 500.0 => 2,
        i if i < 1000.0 => 3,
        i if i < 10_000.0 => 4,
        _ => 5,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub config_name: ProfileName,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub range: String,
    pub count: usize,
}

/// Aggregate view of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub total: usize,
    pub profiles: Vec<ProfileStats>,
    pub distribution: Vec<BucketCount>,
}

impl LeaderboardStats {
    pub fn from_records(records: &[LeaderboardRecord]) -> Self {
        let mut by_profile: BTreeMap<&str, (ProfileName, Vec<f64>)> = BTreeMap::new();
        let mut buckets = [0usize; SCORE_BUCKETS.len()];

        for r in records {
            buckets[bucket_of(r.reference_index)] += 1;
            if r.reference_index > 0.0 {
                by_profile
                    .entry(r.config_name.as_str())
                    .or_insert_with(|| (r.config_name, Vec::new()))
                    .1
                    .push(r.reference_index);
            }
        }

        let profiles = by_profile
            .into_values()
            .map(|(config_name, scores)| ProfileStats {
                config_name,
                count: scores.len(),
                min: scores.iter().cloned().fold(f64::INFINITY, f64::min),
                max: scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                mean: scores.iter().sum::<f64>() / scores.len() as f64,
            })
            .collect();

        let distribution = SCORE_BUCKETS
            .iter()
            .zip(buckets)
            .map(|(range, count)| BucketCount {
                range: range.to_string(),
                count,
            })
            .collect();

        LeaderboardStats {
            total: records.len(),
            profiles,
            distribution,
        }
    }
}
