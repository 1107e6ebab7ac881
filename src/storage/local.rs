//! Local results directory.
//!
//! Each run writes `benchmark_YYYYMMDD_HHMMSS.json`; a shared run also writes
//! an anonymised `public_benchmark_YYYYMMDD_HHMMSS.json` next to it.

use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info, warn};

use crate::core::{SubmissionEnvelope, anonymise};
use crate::{BenchError, BenchResult};

/// Paths written by [`save_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedResults {
    pub path: PathBuf,
    pub public_path: Option<PathBuf>,
}

/// File stamp for `at`, in UTC.
pub fn results_stamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    at.format(&format).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Saved result file found in a results directory.
#[derive(Debug, Clone)]
pub struct SavedRun {
    pub path: PathBuf,
    /// Anonymised `public_benchmark_*` copy
    pub public: bool,
    /// Stamp from the file name, when it parses
    pub stamp: Option<PrimitiveDateTime>,
    pub envelope: SubmissionEnvelope,
}

/// Classify a results file name: `Some((public, stamp))` for
/// `benchmark_<stamp>.json` and `public_benchmark_<stamp>.json`.
pub fn parse_results_name(name: &str) -> Option<(bool, Option<PrimitiveDateTime>)> {
    let stem = name.strip_suffix(".json")?;
    let (public, stamp) = match stem.strip_prefix("public_benchmark_") {
        Some(stamp) => (true, stamp),
        None => (false, stem.strip_prefix("benchmark_")?),
    };
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    Some((public, PrimitiveDateTime::parse(stamp, &format).ok()))
}

/// Load every saved run in `dir`, oldest stamp first.
///
/// Files that are not result files are ignored; result files that fail to
/// parse are skipped with a warning.
pub fn load_saved_runs(dir: &Path) -> BenchResult<Vec<SavedRun>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        BenchError::Message(format!("failed to read results directory {}: {e}", dir.display()))
    })?;

    let mut runs = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| BenchError::Message(format!("failed to list {}: {e}", dir.display())))?
            .path();
        let Some((public, stamp)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_results_name)
        else {
            debug!(path = %path.display(), "not a results file");
            continue;
        };

        let envelope = load_envelope(&path).and_then(|raw| {
            serde_json::from_value::<SubmissionEnvelope>(raw)
                .map_err(|e| BenchError::Message(format!("{}: {e}", path.display())))
        });
        match envelope {
            Ok(envelope) => runs.push(SavedRun {
                path,
                public,
                stamp,
                envelope,
            }),
            Err(e) => warn!(error = %e, "skipping unreadable results file"),
        }
    }

    runs.sort_by(|a, b| a.stamp.cmp(&b.stamp).then_with(|| a.path.cmp(&b.path)));
    Ok(runs)
}

/// Copy of the envelope with identifying system-info keys removed.
pub fn anonymised(envelope: &SubmissionEnvelope) -> SubmissionEnvelope {
    let mut public = envelope.clone();
    anonymise(&mut public.system_info);
    public
}

pub fn save_results(
    dir: &Path,
    envelope: &SubmissionEnvelope,
    share: bool,
) -> BenchResult<SavedResults> {
    save_results_at(dir, envelope, share, OffsetDateTime::now_utc())
}

pub fn save_results_at(
    dir: &Path,
    envelope: &SubmissionEnvelope,
    share: bool,
    at: OffsetDateTime,
) -> BenchResult<SavedResults> {
    std::fs::create_dir_all(dir)
        .map_err(|e| BenchError::Message(format!("failed to create {}: {e}", dir.display())))?;

    let stamp = results_stamp(at);
    let path = dir.join(format!("benchmark_{stamp}.json"));
    write_json(&path, envelope)?;
    info!(path = %path.display(), "saved results");

    let public_path = if share {
        let public_path = dir.join(format!("public_benchmark_{stamp}.json"));
        write_json(&public_path, &anonymised(envelope))?;
        info!(path = %public_path.display(), "saved anonymised results");
        Some(public_path)
    } else {
        None
    };

    Ok(SavedResults { path, public_path })
}

fn write_json(path: &Path, envelope: &SubmissionEnvelope) -> BenchResult<()> {
    let json = serde_json::to_string_pretty(envelope)
        .map_err(|e| BenchError::Message(format!("failed to serialize results: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| BenchError::Message(format!("failed to write {}: {e}", path.display())))
}

/// Load a saved envelope, e.g. for offline verification.
pub fn load_envelope(path: &Path) -> BenchResult<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Message(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| BenchError::Message(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BenchmarkResults, ProfileName};
    use serde_json::json;
    use time::macros::datetime;

    fn envelope() -> SubmissionEnvelope {
        SubmissionEnvelope::new(
            json!({"os": "Linux", "hostname": "lab-3", "user": "alice"}),
            BenchmarkResults::default(),
            120.0,
            ProfileName::Light,
        )
    }

    #[test]
    fn test_stamp_format() {
        assert_eq!(results_stamp(datetime!(2025-02-03 04:05:06 UTC)), "20250203_040506");
    }

    #[test]
    fn test_private_copy_only() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_results_at(dir.path(), &envelope(), false, datetime!(2025-02-03 04:05:06 UTC))
            .unwrap();
        assert!(saved.path.ends_with("benchmark_20250203_040506.json"));
        assert!(saved.public_path.is_none());

        let loaded = load_envelope(&saved.path).unwrap();
        assert_eq!(loaded["system_info"]["hostname"], "lab-3");
    }

    #[test]
    fn test_results_names() {
        let (public, stamp) = parse_results_name("public_benchmark_20250203_040506.json").unwrap();
        assert!(public);
        assert_eq!(stamp, Some(datetime!(2025-02-03 04:05:06)));

        assert_eq!(parse_results_name("benchmark_latest.json"), Some((false, None)));
        assert_eq!(parse_results_name("notes.json"), None);
        assert_eq!(parse_results_name("benchmark_20250203_040506.txt"), None);
    }

    #[test]
    fn test_load_saved_runs_orders_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        save_results_at(dir.path(), &envelope(), true, datetime!(2025-02-04 00:00:00 UTC)).unwrap();
        save_results_at(dir.path(), &envelope(), false, datetime!(2025-02-03 00:00:00 UTC)).unwrap();
        std::fs::write(dir.path().join("benchmark_20250205_000000.json"), "{truncated").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let runs = load_saved_runs(dir.path()).unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].stamp, Some(datetime!(2025-02-03 00:00:00)));
        assert!(runs[1..].iter().all(|r| r.stamp == Some(datetime!(2025-02-04 00:00:00))));
        assert_eq!(runs.iter().filter(|r| r.public).count(), 1);

        assert!(load_saved_runs(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_shared_copy_is_anonymised() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_results(dir.path(), &envelope(), true).unwrap();
        let public_path = saved.public_path.unwrap();

        let public = load_envelope(&public_path).unwrap();
        assert!(public["system_info"].get("hostname").is_none());
        assert!(public["system_info"].get("user").is_none());
        assert_eq!(public["system_info"]["os"], "Linux");
        assert_eq!(public["uuid"], load_envelope(&saved.path).unwrap()["uuid"]);
    }
}
