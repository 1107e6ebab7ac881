//! `history`: aggregate the runs saved in a local results directory.
//!
//! Runs are grouped by system, file stamp and profile, so a private result and
//! its anonymised public copy collapse into one row. Timings and the index are
//! medians over each group, and the index is recomputed with the current
//! scoring scheme so runs saved under older metric names stay comparable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use time::PrimitiveDateTime;
use time::macros::format_description;

use crate::bench::harness::Reduction;
use crate::core::{Category, ProfileName};
use crate::score::{CURRENT_SCHEME, ScoringScheme};
use crate::storage::{SavedRun, load_saved_runs};
use crate::{BenchError, BenchResult};

/// One aggregated line of the local history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    /// `YYYY-MM-DD HH:MM:SS`, empty for files without a stamp
    pub stamp: String,
    pub system: String,
    pub config_name: ProfileName,
    /// Result files folded into this row
    pub files: usize,
    pub cpu_time_s: Option<f64>,
    pub gpu_time_s: Option<f64>,
    pub memory_time_s: Option<f64>,
    pub reference_index: f64,
}

/// Short label identifying the hardware a run was made on.
pub fn system_id(info: &Value) -> String {
    let text = |key: &str| info.get(key).and_then(Value::as_str).unwrap_or("unknown");
    let cores = info
        .get("cpu_cores")
        .or_else(|| info.get("cpu_count"))
        .and_then(Value::as_u64)
        .map_or_else(|| "?".to_string(), |n| n.to_string());
    let memory = info
        .get("memory_gb")
        .and_then(Value::as_f64)
        .map_or_else(|| "?".to_string(), |gb| format!("{gb:.1}"));
    format!("{} | {} ({cores} cores) | {memory} GB", text("os"), text("cpu_model"))
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    Reduction::Median.reduce(&values.collect::<Vec<_>>())
}

/// Fold saved runs into rows, oldest first.
pub fn aggregate(runs: &[SavedRun]) -> Vec<HistoryRow> {
    type Key = (Option<PrimitiveDateTime>, String, ProfileName);
    let mut groups: BTreeMap<Key, Vec<&SavedRun>> = BTreeMap::new();
    for run in runs {
        let key = (
            run.stamp,
            system_id(&run.envelope.system_info),
            run.envelope.config_name,
        );
        groups.entry(key).or_default().push(run);
    }

    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    groups
        .into_iter()
        .map(|((stamp, system, config_name), group)| {
            let timing = |category: Category, aliases: &[&str]| {
                median(group.iter().filter_map(|r| {
                    ScoringScheme::canonical(r.envelope.results.bag(category), aliases)
                }))
            };
            HistoryRow {
                stamp: stamp
                    .and_then(|s| s.format(&format).ok())
                    .unwrap_or_default(),
                system,
                config_name,
                files: group.len(),
                cpu_time_s: timing(Category::Cpu, CURRENT_SCHEME.cpu_aliases),
                gpu_time_s: timing(Category::Gpu, CURRENT_SCHEME.gpu_aliases),
                memory_time_s: timing(Category::Memory, CURRENT_SCHEME.memory_aliases),
                reference_index: median(
                    group
                        .iter()
                        .map(|r| CURRENT_SCHEME.score(&r.envelope.results).reference_index),
                )
                .unwrap_or(0.0),
            }
        })
        .collect()
}

fn write_csv(rows: &[HistoryRow], path: &Path) -> BenchResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| BenchError::Message(format!("failed to create {}: {e}", path.display())))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| BenchError::Message(format!("failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| BenchError::Message(format!("failed to flush CSV writer: {e}")))
}

fn seconds(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |s| format!("{s:.4}"))
}

pub fn run(results_dir: PathBuf, csv: Option<PathBuf>) -> BenchResult<()> {
    let runs = load_saved_runs(&results_dir)?;
    let rows = aggregate(&runs);

    if let Some(path) = csv {
        write_csv(&rows, &path)?;
        println!("Exported {} rows to {}", rows.len(), path.display());
        return Ok(());
    }

    if rows.is_empty() {
        println!("No saved runs in {}", results_dir.display());
        return Ok(());
    }
    println!(
        "{:<19}  {:<8}  {:>5}  {:>8}  {:>8}  {:>8}  {:>10}  {}",
        "stamp", "profile", "files", "cpu_s", "gpu_s", "mem_s", "index", "system"
    );
    for r in &rows {
        println!(
            "{:<19}  {:<8}  {:>5}  {:>8}  {:>8}  {:>8}  {:>10.2}  {}",
            r.stamp,
            r.config_name,
            r.files,
            seconds(r.cpu_time_s),
            seconds(r.gpu_time_s),
            seconds(r.memory_time_s),
            r.reference_index,
            r.system
        );
    }
    Ok(())
}
