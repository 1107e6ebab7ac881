//! Category workload trait and the set the runner executes.

use crate::BenchResult;
use crate::core::{Category, ResultBag};

use super::config::ConfigProfile;
use super::harness::Clock;

/// One benchmark category's workloads.
///
/// Implementations time their own sub-benchmarks through the harness and
/// return the assembled bag. Environment-dependent categories report a
/// missing backend as `BenchError::CapabilityUnavailable`.
pub trait CategoryWorkload: Send + Sync {
    /// Category this workload fills.
    fn category(&self) -> Category;

    /// Metric names the bag carries; used to build a zero bag on soft failure.
    fn metric_names(&self) -> Vec<String>;

    /// Execute every sub-benchmark with the profile's sizes.
    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag>;
}

/// Ordered collection of category workloads, at most one per category.
#[derive(Default)]
pub struct WorkloadSet {
    workloads: Vec<Box<dyn CategoryWorkload>>,
}

impl WorkloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a workload, replacing any existing one for the same category.
    pub fn with(mut self, workload: impl CategoryWorkload + 'static) -> Self {
        self.insert(Box::new(workload));
        self
    }

    pub fn insert(&mut self, workload: Box<dyn CategoryWorkload>) {
        let category = workload.category();
        self.workloads.retain(|w| w.category() != category);
        self.workloads.push(workload);
    }

    pub fn get(&self, category: Category) -> Option<&dyn CategoryWorkload> {
        self.workloads
            .iter()
            .find(|w| w.category() == category)
            .map(|w| w.as_ref())
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

impl std::fmt::Debug for WorkloadSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.workloads.iter().map(|w| w.category()))
            .finish()
    }
}
