//! Benchmark runner: executes every category in a fixed order under one profile.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::core::{BenchmarkResults, Category, ProfileName, ResultBag, SystemInfo};
use crate::{BenchError, BenchResult};

use super::config::ConfigProfile;
use super::harness::{Clock, MonotonicClock};
use super::workload::WorkloadSet;

/// A category that degraded to a zero bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoftFailure {
    pub category: Category,
    pub reason: String,
}

/// Unscored output of one full run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub profile: ProfileName,
    pub system_info: Value,
    pub results: BenchmarkResults,
    pub soft_failures: Vec<SoftFailure>,
}

/// Runs every category sequentially; one workload finishes before the next starts.
pub struct BenchmarkRunner {
    profile: ConfigProfile,
    workloads: WorkloadSet,
    clock: Box<dyn Clock>,
}

impl BenchmarkRunner {
    pub fn new(profile: ConfigProfile, workloads: WorkloadSet) -> Self {
        BenchmarkRunner {
            profile,
            workloads,
            clock: Box::new(MonotonicClock::new()),
        }
    }

    /// Runner with the built-in workloads for a registered profile.
    pub fn for_profile(name: ProfileName) -> Self {
        Self::new(ConfigProfile::get(name).clone(), WorkloadSet::builtin())
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn profile(&self) -> &ConfigProfile {
        &self.profile
    }

    /// Detect the host and run every category.
    pub fn run(&self) -> BenchResult<RunOutput> {
        self.run_with_system_info(|| SystemInfo::detect().to_descriptor())
    }

    /// Run every category with caller-supplied system info.
    ///
    /// Only a `CapabilityUnavailable` from an environment-dependent category is
    /// absorbed; any other error aborts the run and no output is produced.
    pub fn run_with_system_info<P>(&self, system_info: P) -> BenchResult<RunOutput>
    where
        P: FnOnce() -> Value,
    {
        info!(profile = %self.profile.name, "gathering system info");
        let system_info = system_info();

        let mut results = BenchmarkResults::default();
        let mut soft_failures = Vec::new();
        for category in Category::ALL {
            let workload = self.workloads.get(category).ok_or_else(|| {
                BenchError::Message(format!("no workload registered for {category}"))
            })?;

            info!(%category, "running benchmark");
            let bag = match workload.run(&self.profile, self.clock.as_ref()) {
                Ok(bag) => bag,
                Err(BenchError::CapabilityUnavailable(reason))
                    if category.is_environment_dependent() =>
                {
                    warn!(%category, %reason, "capability unavailable, scoring as zero");
                    soft_failures.push(SoftFailure {
                        category,
                        reason,
                    });
                    ResultBag::unavailable(workload.metric_names())
                }
                Err(e) => return Err(e),
            };
            info!(%category, metrics = bag.len(), "finished benchmark");
            *results.bag_mut(category) = bag;
        }

        Ok(RunOutput {
            profile: self.profile.name,
            system_info,
            results,
            soft_failures,
        })
    }
}
