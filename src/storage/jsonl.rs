//! JSONL (JSON Lines) leaderboard store.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info, warn};

use crate::core::schema::{AcceptedSubmission, LeaderboardRecord, SCHEMA_VERSION};
use crate::{BenchError, BenchResult};

use super::store::{LeaderboardQuery, LeaderboardStore, Table, poisoned, select};

/// Durable leaderboard backed by an append-only JSONL file.
///
/// Each accepted record is one JSON line. The file is loaded once on open;
/// afterwards the in-memory table is authoritative and every insert appends
/// and flushes its line before the record becomes visible to queries.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    table: RwLock<Table>,
}

impl JsonlStore {
    /// Open the store at `path`, creating parent directories if needed.
    ///
    /// A missing file is an empty leaderboard.
    pub fn open(path: impl AsRef<Path>) -> BenchResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BenchError::StorageUnavailable(format!("failed to create directory: {e}"))
                })?;
            }
        }
        repair_tail(&path)?;
        let records = read_records(&path)?;
        info!(path = %path.display(), records = records.len(), "opened leaderboard");
        Ok(JsonlStore {
            path,
            table: RwLock::new(Table::from_records(records)?),
        })
    }

    /// Get the path to the JSONL file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &LeaderboardRecord) -> BenchResult<()> {
        if record.schema_version != SCHEMA_VERSION {
            return Err(BenchError::Message(format!(
                "schema version mismatch: record has v{}, expected v{}",
                record.schema_version, SCHEMA_VERSION
            )));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| BenchError::StorageUnavailable(format!("failed to open file: {e}")))?;

        let json = serde_json::to_string(record)
            .map_err(|e| BenchError::Message(format!("failed to serialize record: {e}")))?;

        let start = file
            .metadata()
            .map_err(|e| BenchError::StorageUnavailable(format!("failed to stat file: {e}")))?
            .len();

        // a failed write must not leave a fragment for the next line to join onto
        if let Err(e) = writeln!(file, "{json}").and_then(|_| file.sync_data()) {
            if let Err(undo) = file.set_len(start) {
                warn!(path = %self.path.display(), error = %undo, "failed to roll back partial write");
            }
            return Err(BenchError::StorageUnavailable(format!(
                "failed to write record: {e}"
            )));
        }

        debug!(id = record.id, uuid = %record.uuid, "appended record");
        Ok(())
    }
}

impl LeaderboardStore for JsonlStore {
    fn insert(&self, submission: AcceptedSubmission) -> BenchResult<u64> {
        let mut table = self.table.write().map_err(poisoned)?;
        let record = table.prepare(submission)?;
        self.append(&record)?;
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

/// Deal with a final line that lacks its newline: a complete record gets its
/// terminator, anything else is a torn write and is cut off.
fn repair_tail(path: &Path) -> BenchResult<()> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(BenchError::StorageUnavailable(format!("failed to read file: {e}")));
        }
    };
    if bytes.last().is_none_or(|b| *b == b'\n') {
        return Ok(());
    }

    let line_start = bytes
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    let tail = &bytes[line_start..];
    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|e| BenchError::StorageUnavailable(format!("failed to open file: {e}")))?;

    let result = if serde_json::from_slice::<LeaderboardRecord>(tail).is_ok() {
        debug!(path = %path.display(), "terminating last record");
        (&file).write_all(b"\n")
    } else {
        warn!(
            path = %path.display(),
            bytes = tail.len(),
            "dropping unterminated partial line"
        );
        file.set_len(line_start as u64)
    };
    result
        .and_then(|_| file.sync_data())
        .map_err(|e| BenchError::StorageUnavailable(format!("failed to repair file: {e}")))
}

/// Read every record from a JSONL file; a missing file yields none.
pub fn read_records(path: &Path) -> BenchResult<Vec<LeaderboardRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .map_err(|e| BenchError::StorageUnavailable(format!("failed to open file: {e}")))?;

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(|e| {
            BenchError::StorageUnavailable(format!("failed to read line {}: {e}", line_num + 1))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let record: LeaderboardRecord = serde_json::from_str(&line).map_err(|e| {
            BenchError::Message(format!("failed to parse line {}: {e}", line_num + 1))
        })?;

        if record.schema_version != SCHEMA_VERSION {
            return Err(BenchError::Message(format!(
                "line {}: schema version v{} is not supported (expected v{})",
                line_num + 1,
                record.schema_version,
                SCHEMA_VERSION
            )));
        }

        records.push(record);
    }

    Ok(records)
}
