//! Mock workload for testing.

use std::sync::{Arc, Mutex};

use crate::core::{Category, ResultBag};
use crate::{BenchError, BenchResult};

use super::config::ConfigProfile;
use super::harness::Clock;
use super::workload::CategoryWorkload;

/// Configuration for mock workload responses.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Category to fill
    pub category: Category,
    /// Metrics to report, in seconds
    pub metrics: Vec<(String, f64)>,
    /// Report the capability as missing
    pub unavailable: bool,
    /// Fail with a measurement error
    pub fails: bool,
    /// Shared log of executed categories, in call order
    pub call_log: Option<Arc<Mutex<Vec<Category>>>>,
}

impl MockConfig {
    /// Create a new mock config for the given category with no metrics.
    pub fn new(category: Category) -> Self {
        MockConfig {
            category,
            metrics: Vec::new(),
            unavailable: false,
            fails: false,
            call_log: None,
        }
    }

    /// Report `name` with a fixed value.
    pub fn with_metric(mut self, name: impl Into<String>, seconds: f64) -> Self {
        self.metrics.push((name.into(), seconds));
        self
    }

    /// Make the capability unavailable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Make run fail.
    pub fn fails(mut self) -> Self {
        self.fails = true;
        self
    }

    /// Record executions in `log`.
    pub fn with_call_log(mut self, log: Arc<Mutex<Vec<Category>>>) -> Self {
        self.call_log = Some(log);
        self
    }
}

/// Mock workload for unit testing.
///
/// Returns configured values without performing any work.
pub struct MockWorkload {
    config: MockConfig,
}

impl MockWorkload {
    pub fn new(config: MockConfig) -> Self {
        MockWorkload { config }
    }
}

impl CategoryWorkload for MockWorkload {
    fn category(&self) -> Category {
        self.config.category
    }

    fn metric_names(&self) -> Vec<String> {
        self.config.metrics.iter().map(|(n, _)| n.clone()).collect()
    }

    fn run(&self, _profile: &ConfigProfile, _clock: &dyn Clock) -> BenchResult<ResultBag> {
        if let Some(log) = &self.config.call_log {
            if let Ok(mut log) = log.lock() {
                log.push(self.config.category);
            }
        }
        if self.config.unavailable {
            return Err(BenchError::CapabilityUnavailable(format!(
                "mock {} backend unavailable",
                self.config.category
            )));
        }
        if self.config.fails {
            return Err(BenchError::measurement(
                self.config.category.as_str(),
                "mock workload failure",
            ));
        }
        Ok(self.config.metrics.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::harness::MonotonicClock;

    #[test]
    fn test_mock_reports_configured_metrics() {
        let mock = MockWorkload::new(
            MockConfig::new(Category::Cpu)
                .with_metric("calculate_primes", 0.5)
                .with_metric("parallel_processing", 0.1),
        );
        let bag = mock
            .run(&ConfigProfile::default(), &MonotonicClock::new())
            .unwrap();
        assert_eq!(bag.number("calculate_primes"), Some(0.5));
        assert_eq!(mock.metric_names().len(), 2);
    }

    #[test]
    fn test_mock_unavailable_is_capability_error() {
        let mock = MockWorkload::new(MockConfig::new(Category::Gpu).unavailable());
        let err = mock
            .run(&ConfigProfile::default(), &MonotonicClock::new())
            .unwrap_err();
        assert!(matches!(err, BenchError::CapabilityUnavailable(_)));
    }
}
