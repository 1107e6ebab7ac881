//! Runner-to-report workflow over mock workloads.

use bench_hub::bench::{BenchmarkRunner, ConfigProfile, MockConfig, MockWorkload, WorkloadSet};
use bench_hub::core::{Category, ProfileName};
use bench_hub::run_cmd::build_report;
use bench_hub::score::score_results;
use bench_hub::verify::{VerificationPolicy, verify_submission};
use bench_hub::BenchError;
use serde_json::json;

fn workloads(gpu: MockConfig) -> WorkloadSet {
    WorkloadSet::new()
        .with(MockWorkload::new(
            MockConfig::new(Category::Cpu)
                .with_metric("calculate_primes", 0.5)
                .with_metric("parallel_processing", 0.2),
        ))
        .with(MockWorkload::new(
            MockConfig::new(Category::Memory).with_metric("bandwidth", 0.25),
        ))
        .with(MockWorkload::new(gpu))
        .with(MockWorkload::new(MockConfig::new(Category::Disk).with_metric("sequential_write", 0.1)))
        .with(MockWorkload::new(MockConfig::new(Category::Ml).with_metric("training", 1.0)))
        .with(MockWorkload::new(MockConfig::new(Category::Plot).with_metric("render", 0.3)))
}

fn heavy() -> ConfigProfile {
    ConfigProfile::get(ProfileName::Heavy).clone()
}

#[test]
fn test_report_verifies_against_its_own_index() {
    let gpu = MockConfig::new(Category::Gpu).with_metric("tensor_operations", 0.4);
    let runner = BenchmarkRunner::new(heavy(), workloads(gpu));
    let output = runner.run_with_system_info(|| json!({"os": "Linux", "cpu_model": "test"})).unwrap();
    let report = build_report(output);

    assert_eq!(report.envelope.config_name, ProfileName::Heavy);
    assert_eq!(report.score, score_results(&report.envelope.results));
    // 0.4/0.5 + 0.4/0.4 + 0.2/0.25 = 2.6
    assert!((report.score.reference_index - 2600.0).abs() < 1e-6);

    let accepted = verify_submission(report.envelope.clone(), &VerificationPolicy::default()).unwrap();
    assert_eq!(accepted.server_score, report.score.reference_index);
}

#[test]
fn test_missing_gpu_scores_zero_and_is_reported() {
    let gpu = MockConfig::new(Category::Gpu)
        .with_metric("tensor_operations", 0.4)
        .unavailable();
    let runner = BenchmarkRunner::new(heavy(), workloads(gpu));
    let report = build_report(runner.run_with_system_info(|| json!({})).unwrap());

    assert_eq!(report.score.gpu, 0.0);
    assert_eq!(report.envelope.results.gpu.number("tensor_operations"), Some(0.0));
    assert_eq!(report.soft_failures.len(), 1);
    assert_eq!(report.soft_failures[0].category, Category::Gpu);
    assert!((report.score.reference_index - 1600.0).abs() < 1e-6);
}

#[test]
fn test_hard_failure_aborts_run() {
    let gpu = MockConfig::new(Category::Gpu).with_metric("tensor_operations", 0.4);
    let set = workloads(gpu).with(MockWorkload::new(
        MockConfig::new(Category::Disk).with_metric("sequential_write", 0.1).fails(),
    ));
    let err = BenchmarkRunner::new(heavy(), set)
        .run_with_system_info(|| json!({}))
        .unwrap_err();
    assert!(matches!(err, BenchError::Measurement { .. }));
}
