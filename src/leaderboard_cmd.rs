//! `leaderboard` and `stats`: read the ranked board from a local store or a server.

use std::path::PathBuf;

use crate::client::LeaderboardClient;
use crate::core::{LeaderboardRecord, ProfileName};
use crate::storage::{
    CsvExporter, JsonlStore, LeaderboardQuery, LeaderboardStats, LeaderboardStore,
};
use crate::{BenchError, BenchResult};

/// Where to read the leaderboard from.
#[derive(Debug, Clone)]
pub enum Source {
    Store(PathBuf),
    Url(String),
}

impl Source {
    pub fn from_args(store: Option<PathBuf>, url: Option<String>) -> BenchResult<Self> {
        match (store, url) {
            (Some(_), Some(_)) => Err(BenchError::Message(
                "pass either --store or --url, not both".to_string(),
            )),
            (_, Some(url)) => Ok(Source::Url(url)),
            (store, None) => Ok(Source::Store(
                store.unwrap_or_else(|| PathBuf::from("leaderboard.jsonl")),
            )),
        }
    }

    pub fn query(&self, query: &LeaderboardQuery) -> BenchResult<Vec<LeaderboardRecord>> {
        match self {
            Source::Store(path) => JsonlStore::open(path)?.query(query),
            Source::Url(url) => LeaderboardClient::new(url)?.leaderboard(query),
        }
    }

    pub fn stats(&self) -> BenchResult<LeaderboardStats> {
        match self {
            Source::Store(path) => JsonlStore::open(path)?.stats(),
            Source::Url(url) => LeaderboardClient::new(url)?.stats(),
        }
    }
}

pub fn run(
    source: Source,
    config_name: Option<ProfileName>,
    limit: Option<usize>,
    csv: Option<PathBuf>,
) -> BenchResult<()> {
    let records = source.query(&LeaderboardQuery { config_name, limit })?;

    if let Some(path) = csv {
        CsvExporter::new().export(&records, &path)?;
        println!("Exported {} records to {}", records.len(), path.display());
        return Ok(());
    }

    if records.is_empty() {
        println!("No results yet.");
        return Ok(());
    }
    println!(
        "{:>4}  {:>12}  {:<8}  {:<20}  {}",
        "rank", "index", "profile", "timestamp", "cpu"
    );
    for (i, r) in records.iter().enumerate() {
        let cpu = r
            .system_info
            .get("cpu_model")
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        println!(
            "{:>4}  {:>12.2}  {:<8}  {:<20}  {}",
            i + 1,
            r.reference_index,
            r.config_name,
            r.timestamp,
            cpu
        );
    }
    Ok(())
}

pub fn stats(source: Source) -> BenchResult<()> {
    let stats = source.stats()?;
    println!("Total results: {}", stats.total);
    if stats.total == 0 {
        return Ok(());
    }

    println!("\nBy configuration:");
    for p in &stats.profiles {
        println!("  {}: {} results", p.config_name, p.count);
        println!("    Range: {:.1} - {:.1} (avg: {:.1})", p.min, p.max, p.mean);
    }

    println!("\nScore distribution:");
    for b in stats.distribution.iter().filter(|b| b.count > 0) {
        println!("  {}: {} results", b.range, b.count);
    }
    Ok(())
}
