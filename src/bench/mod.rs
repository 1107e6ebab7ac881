//! Benchmark side: timing harness, profiles, workloads and the runner.

pub mod builtin;
pub mod config;
pub mod harness;
pub mod mock;
pub mod runner;
pub mod workload;

pub use builtin::{CpuWorkload, DiskWorkload, GpuWorkload, MemoryWorkload, MlWorkload, PlotWorkload};
pub use config::{ConfigProfile, list_profiles};
pub use harness::{
    Clock, Measurement, MonotonicClock, Reduction, ResultAccumulator, RunPolicy, ScriptedClock,
    measure,
};
pub use mock::{MockConfig, MockWorkload};
pub use runner::{BenchmarkRunner, RunOutput, SoftFailure};
pub use workload::{CategoryWorkload, WorkloadSet};
