//! `run`: benchmark this machine, score, save locally and optionally submit.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::bench::{BenchmarkRunner, RunOutput, SoftFailure};
use crate::client::LeaderboardClient;
use crate::core::{ProfileName, SubmissionEnvelope};
use crate::score::{ScoreBreakdown, score_results};
use crate::storage::local::anonymised;
use crate::storage::save_results;
use crate::verify::Receipt;
use crate::{BenchError, BenchResult};

pub const DEFAULT_RESULTS_DIR: &str = "results";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub profile: ProfileName,
    pub results_dir: PathBuf,
    /// Also write an anonymised public copy
    pub share: bool,
    /// Leaderboard base URL to submit to
    pub submit: Option<String>,
    /// Machine-readable report path
    pub json: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            profile: ProfileName::default(),
            results_dir: PathBuf::from(DEFAULT_RESULTS_DIR),
            share: false,
            submit: None,
            json: None,
        }
    }
}

/// Scored outcome of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub envelope: SubmissionEnvelope,
    pub score: ScoreBreakdown,
    pub soft_failures: Vec<SoftFailure>,
}

/// Score a runner's output and wrap it in a fresh envelope.
pub fn build_report(output: RunOutput) -> RunReport {
    let score = score_results(&output.results);
    let envelope = SubmissionEnvelope::new(
        output.system_info,
        output.results,
        score.reference_index,
        output.profile,
    );
    RunReport {
        envelope,
        score,
        soft_failures: output.soft_failures,
    }
}

pub fn run(opts: RunOptions) -> BenchResult<()> {
    let runner = BenchmarkRunner::for_profile(opts.profile);
    let report = build_report(runner.run()?);
    finish(&report, &opts)
}

/// Everything after measurement: save, report, submit.
pub fn finish(report: &RunReport, opts: &RunOptions) -> BenchResult<()> {
    let saved = save_results(&opts.results_dir, &report.envelope, opts.share)?;
    print_summary(report);
    println!("Results saved to {}", saved.path.display());
    if let Some(public) = &saved.public_path {
        println!("Anonymised copy saved to {}", public.display());
    }

    if let Some(path) = &opts.json {
        write_report(path, report)?;
    }

    if let Some(url) = &opts.submit {
        let receipt = submit(url, &report.envelope)?;
        println!(
            "Submitted as #{} (server index {:.2})",
            receipt.id, receipt.reference_index
        );
    }
    Ok(())
}

fn submit(url: &str, envelope: &SubmissionEnvelope) -> BenchResult<Receipt> {
    let client = LeaderboardClient::new(url)?;
    client.submit(&anonymised(envelope)).inspect_err(|e| {
        if e.is_retryable() {
            warn!(error = %e, "submission failed; results are saved locally, retry later");
        }
    })
}

fn write_report(path: &Path, report: &RunReport) -> BenchResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(|e| BenchError::Message(e.to_string()))?;
        }
    }
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| BenchError::Message(format!("failed to serialize report: {e}")))?;
    std::fs::write(path, json).map_err(|e| BenchError::Message(e.to_string()))?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

fn print_summary(report: &RunReport) {
    let s = &report.score;
    println!("Profile:          {}", report.envelope.config_name);
    println!("CPU score:        {:.4}", s.cpu);
    println!("GPU score:        {:.4}", s.gpu);
    println!("Memory score:     {:.4}", s.memory);
    println!("Reference index:  {:.2} (scoring v{})", s.reference_index, s.scoring_version);
    for f in &report.soft_failures {
        println!("  {} unavailable: {}", f.category, f.reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{ConfigProfile, MockConfig, MockWorkload, WorkloadSet};
    use crate::core::Category;
    use serde_json::json;

    fn mock_output() -> RunOutput {
        let mut set = WorkloadSet::new();
        for category in Category::ALL {
            set.insert(Box::new(MockWorkload::new(MockConfig::new(category))));
        }
        let set = set
            .with(MockWorkload::new(
                MockConfig::new(Category::Cpu).with_metric("calculate_primes", 0.5),
            ))
            .with(MockWorkload::new(
                MockConfig::new(Category::Memory).with_metric("bandwidth", 0.25),
            ))
            .with(MockWorkload::new(
                MockConfig::new(Category::Gpu)
                    .with_metric("tensor_operations", 1.0)
                    .unavailable(),
            ));
        BenchmarkRunner::new(ConfigProfile::get(ProfileName::Light).clone(), set)
            .run_with_system_info(|| json!({"os": "Linux", "hostname": "h"}))
            .unwrap()
    }

    #[test]
    fn test_report_declares_client_score() {
        let report = build_report(mock_output());
        assert_eq!(report.envelope.reference_index, report.score.reference_index);
        assert_eq!(report.envelope.config_name, ProfileName::Light);
        assert_eq!(report.score.gpu, 0.0);
        assert_eq!(report.soft_failures.len(), 1);
    }

    #[test]
    fn test_finish_saves_results_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let opts = RunOptions {
            results_dir: dir.path().join("results"),
            share: true,
            json: Some(dir.path().join("report.json")),
            ..RunOptions::default()
        };
        finish(&build_report(mock_output()), &opts).unwrap();

        let files = std::fs::read_dir(dir.path().join("results")).unwrap().count();
        assert_eq!(files, 2);
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("report.json")).unwrap())
                .unwrap();
        assert_eq!(report["envelope"]["config_name"], "light");
        assert_eq!(report["soft_failures"][0]["category"], "gpu");
    }
}
