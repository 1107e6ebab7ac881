//! Reference index scoring.
//!
//! Each component score is `(1 / duration) * weight` over one canonical timing
//! metric, looked up through a versioned alias table. The reference index is
//! the sum of the three weighted components scaled by [`INDEX_SCALE`].
//! Unmeasured input (missing key, zero, negative, non-finite) scores `0`.

use serde::Serialize;

use crate::core::{BenchmarkResults, ResultBag};

pub const CPU_WEIGHT: f64 = 0.4;
pub const GPU_WEIGHT: f64 = 0.4;
pub const MEMORY_WEIGHT: f64 = 0.2;

/// Presentation scale applied to the weighted sum.
pub const INDEX_SCALE: f64 = 1000.0;

/// Weights and metric aliases of one scoring revision.
///
/// Changing anything here requires a new `version`: records scored under
/// different versions are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringScheme {
    pub version: u32,
    pub cpu_weight: f64,
    pub gpu_weight: f64,
    pub memory_weight: f64,
    pub scale: f64,
    /// Candidate keys in precedence order; the first present key wins.
    pub cpu_aliases: &'static [&'static str],
    pub gpu_aliases: &'static [&'static str],
    pub memory_aliases: &'static [&'static str],
}

pub const CURRENT_SCHEME: ScoringScheme = ScoringScheme {
    version: 2,
    cpu_weight: CPU_WEIGHT,
    gpu_weight: GPU_WEIGHT,
    memory_weight: MEMORY_WEIGHT,
    scale: INDEX_SCALE,
    cpu_aliases: &["calculate_primes", "floating_point", "floating_point_operations"],
    gpu_aliases: &["tensor_operations", "gpu_tensor_operations"],
    memory_aliases: &["bandwidth", "memory_bandwidth", "allocation", "memory_allocation"],
};

/// Component and total scores of one result set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub cpu: f64,
    pub gpu: f64,
    pub memory: f64,
    pub reference_index: f64,
    pub scoring_version: u32,
}

impl ScoringScheme {
    /// First alias present in `bag` as a number, whatever its value.
    pub fn canonical(bag: &ResultBag, aliases: &[&str]) -> Option<f64> {
        aliases.iter().find_map(|key| bag.number(key))
    }

    fn component(bag: &ResultBag, aliases: &[&str], weight: f64) -> f64 {
        match Self::canonical(bag, aliases) {
            Some(d) if d.is_finite() && d > 0.0 => {
                let score = weight / d;
                if score.is_finite() { score } else { 0.0 }
            }
            _ => 0.0,
        }
    }

    pub fn score_cpu(&self, bag: &ResultBag) -> f64 {
        Self::component(bag, self.cpu_aliases, self.cpu_weight)
    }

    pub fn score_gpu(&self, bag: &ResultBag) -> f64 {
        Self::component(bag, self.gpu_aliases, self.gpu_weight)
    }

    pub fn score_memory(&self, bag: &ResultBag) -> f64 {
        Self::component(bag, self.memory_aliases, self.memory_weight)
    }

    pub fn reference_index(&self, cpu: f64, gpu: f64, memory: f64) -> f64 {
        (cpu + gpu + memory) * self.scale
    }

    pub fn score(&self, results: &BenchmarkResults) -> ScoreBreakdown {
        let cpu = self.score_cpu(&results.cpu);
        let gpu = self.score_gpu(&results.gpu);
        let memory = self.score_memory(&results.memory);
        ScoreBreakdown {
            cpu,
            gpu,
            memory,
            reference_index: self.reference_index(cpu, gpu, memory),
            scoring_version: self.version,
        }
    }
}

pub fn score_cpu(bag: &ResultBag) -> f64 {
    CURRENT_SCHEME.score_cpu(bag)
}

pub fn score_gpu(bag: &ResultBag) -> f64 {
    CURRENT_SCHEME.score_gpu(bag)
}

pub fn score_memory(bag: &ResultBag) -> f64 {
    CURRENT_SCHEME.score_memory(bag)
}

/// Combine already-weighted component scores into the reference index.
pub fn calculate_reference_index(cpu: f64, gpu: f64, memory: f64) -> f64 {
    CURRENT_SCHEME.reference_index(cpu, gpu, memory)
}

/// Score a full result set with the current scheme.
pub fn score_results(results: &BenchmarkResults) -> ScoreBreakdown {
    CURRENT_SCHEME.score(results)
}
