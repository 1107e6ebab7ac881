//! Timing harness: runs a workload `n_runs` times and reduces the wall-clock
//! samples to one scalar.
//!
//! Runs are strictly sequential. A failing run aborts the whole measurement;
//! samples gathered before the failure are discarded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ResultBag, TimingStat};
use crate::{BenchError, BenchResult};

/// How per-run samples collapse into one figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Median,
    Mean,
}

impl Reduction {
    /// Reduce samples; `None` when there are none.
    pub fn reduce(&self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len();
        match self {
            Reduction::Mean => Some(samples.iter().sum::<f64>() / n as f64),
            Reduction::Median => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                if n % 2 == 0 {
                    Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
                } else {
                    Some(sorted[n / 2])
                }
            }
        }
    }
}

/// Run count and reduction for one measured metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPolicy {
    pub n_runs: usize,
    pub reduction: Reduction,
}

impl RunPolicy {
    pub fn new(n_runs: usize, reduction: Reduction) -> Self {
        RunPolicy { n_runs, reduction }
    }

    pub fn median(n_runs: usize) -> Self {
        Self::new(n_runs, Reduction::Median)
    }

    pub fn mean(n_runs: usize) -> Self {
        Self::new(n_runs, Reduction::Mean)
    }
}

impl Default for RunPolicy {
    fn default() -> Self {
        RunPolicy::median(3)
    }
}

/// Monotonic time source. Abstracted so reductions can be tested exactly.
pub trait Clock {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock replaying a fixed sequence of per-run durations.
///
/// Each run reads the clock twice (start, end); the readings are laid out so
/// that run `i` measures exactly `durations[i]`. Once exhausted the clock
/// stands still and further runs measure zero.
#[derive(Debug)]
pub struct ScriptedClock {
    readings: Mutex<VecDeque<Duration>>,
    last: Mutex<Duration>,
}

impl ScriptedClock {
    pub fn from_secs(durations: &[f64]) -> Self {
        let mut readings = VecDeque::with_capacity(durations.len() * 2);
        let mut t = Duration::ZERO;
        for d in durations {
            readings.push_back(t);
            t += Duration::from_secs_f64(*d);
            readings.push_back(t);
        }
        ScriptedClock {
            readings: Mutex::new(readings),
            last: Mutex::new(t),
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Duration {
        let next = self
            .readings
            .lock()
            .ok()
            .and_then(|mut readings| readings.pop_front());
        match next {
            Some(reading) => reading,
            None => self.last.lock().map(|t| *t).unwrap_or_default(),
        }
    }
}

/// Outcome of a measured workload.
#[derive(Debug, Clone)]
pub struct Measurement<T> {
    /// Value returned by the final run
    pub result: T,
    /// Reduced elapsed time in seconds
    pub elapsed: f64,
    pub samples: Vec<f64>,
    pub stats: TimingStat,
}

/// Execute `workload` `policy.n_runs` times and reduce the elapsed times.
///
/// Errors other than `Measurement` and `CapabilityUnavailable` are wrapped as
/// a `Measurement` failure for `name`.
pub fn measure<T, F>(
    name: &str,
    policy: &RunPolicy,
    clock: &dyn Clock,
    mut workload: F,
) -> BenchResult<Measurement<T>>
where
    F: FnMut() -> BenchResult<T>,
{
    if policy.n_runs == 0 {
        return Err(BenchError::Message(format!(
            "{name}: n_runs must be at least 1"
        )));
    }

    let mut samples = Vec::with_capacity(policy.n_runs);
    let mut last = None;
    for _ in 0..policy.n_runs {
        let start = clock.now();
        let result = workload().map_err(|e| match e {
            BenchError::Measurement { .. } | BenchError::CapabilityUnavailable(_) => e,
            other => BenchError::measurement(name, other),
        })?;
        let end = clock.now();
        samples.push(end.saturating_sub(start).as_secs_f64());
        last = Some(result);
    }

    let (Some(result), Some(elapsed)) = (last, policy.reduction.reduce(&samples)) else {
        return Err(BenchError::measurement(name, "no samples collected"));
    };
    debug!(
        metric = name,
        runs = policy.n_runs,
        reduction = ?policy.reduction,
        elapsed_s = elapsed,
        "measured"
    );
    let stats = TimingStat::from_samples(&samples);
    Ok(Measurement {
        result,
        elapsed,
        samples,
        stats,
    })
}

/// Per-invocation accumulator of named metrics.
///
/// Recording a name twice keeps the later value (last write wins).
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    bag: ResultBag,
    stats: BTreeMap<String, TimingStat>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: &str, value: f64) {
        if self.bag.insert(name, value).is_some() {
            debug!(metric = name, "overwrote earlier value");
        }
    }

    /// Measure `workload` and record its reduced elapsed time under `name`.
    pub fn measure<T, F>(
        &mut self,
        name: &str,
        policy: &RunPolicy,
        clock: &dyn Clock,
        workload: F,
    ) -> BenchResult<T>
    where
        F: FnMut() -> BenchResult<T>,
    {
        let measurement = measure(name, policy, clock, workload)?;
        self.record(name, measurement.elapsed);
        self.stats.insert(name.to_string(), measurement.stats);
        Ok(measurement.result)
    }

    pub fn stats(&self) -> &BTreeMap<String, TimingStat> {
        &self.stats
    }

    pub fn bag(&self) -> &ResultBag {
        &self.bag
    }

    pub fn into_bag(self) -> ResultBag {
        self.bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reduce_scripted(durations: &[f64], reduction: Reduction) -> f64 {
        let clock = ScriptedClock::from_secs(durations);
        let policy = RunPolicy::new(durations.len(), reduction);
        measure("synthetic", &policy, &clock, || Ok(()))
            .unwrap()
            .elapsed
    }

    #[test]
    fn test_median_and_mean_agree_on_symmetric_samples() {
        assert!((reduce_scripted(&[1.0, 2.0, 3.0], Reduction::Median) - 2.0).abs() < 1e-9);
        assert!((reduce_scripted(&[1.0, 2.0, 3.0], Reduction::Mean) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_median_resists_outlier() {
        assert!((reduce_scripted(&[1.0, 2.0, 9.0], Reduction::Median) - 2.0).abs() < 1e-9);
        assert!((reduce_scripted(&[1.0, 2.0, 9.0], Reduction::Mean) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_reduce_even_count_median() {
        assert_eq!(Reduction::Median.reduce(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(Reduction::Mean.reduce(&[]), None);
    }

    #[test]
    fn test_measure_runs_workload_n_times() {
        let clock = MonotonicClock::new();
        let mut calls = 0;
        let m = measure("count", &RunPolicy::median(4), &clock, || {
            calls += 1;
            Ok(calls)
        })
        .unwrap();
        assert_eq!(calls, 4);
        assert_eq!(m.result, 4);
        assert_eq!(m.samples.len(), 4);
        assert_eq!(m.stats.iterations, 4);
    }

    #[test]
    fn test_measure_rejects_zero_runs() {
        let clock = MonotonicClock::new();
        let err = measure("none", &RunPolicy::median(0), &clock, || Ok(())).unwrap_err();
        assert!(err.to_string().contains("n_runs must be at least 1"));
    }

    #[test]
    fn test_failure_aborts_without_partial_statistics() {
        let clock = ScriptedClock::from_secs(&[1.0, 1.0, 1.0]);
        let mut acc = ResultAccumulator::new();
        let mut calls = 0;
        let err = acc
            .measure("flaky", &RunPolicy::mean(3), &clock, || {
                calls += 1;
                if calls == 2 {
                    Err(BenchError::Message("boom".into()))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();

        assert_eq!(calls, 2);
        assert!(matches!(err, BenchError::Measurement { ref benchmark, .. } if benchmark == "flaky"));
        assert!(acc.bag().is_empty());
        assert!(acc.stats().is_empty());
    }

    #[test]
    fn test_capability_error_passes_through() {
        let clock = MonotonicClock::new();
        let err = measure::<(), _>("gpu", &RunPolicy::median(1), &clock, || {
            Err(BenchError::CapabilityUnavailable("no backend".into()))
        })
        .unwrap_err();
        assert!(matches!(err, BenchError::CapabilityUnavailable(_)));
    }

    #[test]
    fn test_accumulator_last_write_wins() {
        let clock = ScriptedClock::from_secs(&[1.0, 5.0]);
        let mut acc = ResultAccumulator::new();
        acc.measure("shared", &RunPolicy::median(1), &clock, || Ok(()))
            .unwrap();
        acc.measure("shared", &RunPolicy::median(1), &clock, || Ok(()))
            .unwrap();

        let bag = acc.into_bag();
        assert_eq!(bag.len(), 1);
        assert!((bag.number("shared").unwrap() - 5.0).abs() < 1e-9);
    }
}
