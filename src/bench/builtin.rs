//! Built-in workloads for every category.
//!
//! The payloads are deliberately simple; only their relative cost across
//! machines matters.

use std::hint::black_box;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::{Category, ResultBag};
use crate::{BenchError, BenchResult};

use super::config::ConfigProfile;
use super::harness::{Clock, ResultAccumulator, RunPolicy};
use super::workload::{CategoryWorkload, WorkloadSet};

const SEED: u64 = 42;

impl WorkloadSet {
    /// The built-in workload for every category.
    pub fn builtin() -> Self {
        WorkloadSet::new()
            .with(CpuWorkload)
            .with(MemoryWorkload)
            .with(GpuWorkload)
            .with(DiskWorkload::default())
            .with(MlWorkload)
            .with(PlotWorkload)
    }
}

// ---------------------------------------------------------------------------
// CPU

pub struct CpuWorkload;

fn count_primes(limit: u64) -> usize {
    (2..=limit)
        .filter(|&n| {
            let mut i = 2;
            while i * i <= n {
                if n % i == 0 {
                    return false;
                }
                i += 1;
            }
            true
        })
        .count()
}

fn sum_of_squares(n: u64) -> u64 {
    (0..n).map(|i| i * i).sum()
}

impl CategoryWorkload for CpuWorkload {
    fn category(&self) -> Category {
        Category::Cpu
    }

    fn metric_names(&self) -> Vec<String> {
        vec![
            "calculate_primes".into(),
            "parallel_processing".into(),
            "floating_point_operations".into(),
        ]
    }

    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag> {
        let policy = profile.run_policy();
        let mut acc = ResultAccumulator::new();

        acc.measure("calculate_primes", &policy, clock, || {
            Ok(black_box(count_primes(black_box(profile.cpu_prime_limit))))
        })?;

        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        acc.measure("parallel_processing", &policy, clock, || {
            std::thread::scope(|s| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| s.spawn(|| sum_of_squares(black_box(10_000))))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join()
                            .map_err(|_| BenchError::Message("worker thread panicked".into()))
                    })
                    .sum::<BenchResult<u64>>()
            })
        })?;

        let data: Vec<f64> = (0..profile.cpu_array_size).map(|i| i as f64).collect();
        acc.measure("floating_point_operations", &policy, clock, || {
            let total: f64 = data.iter().map(|x| x.sqrt() * x.sin() + x.cos()).sum();
            Ok(black_box(total))
        })?;

        Ok(acc.into_bag())
    }
}

// ---------------------------------------------------------------------------
// Memory

pub struct MemoryWorkload;

impl CategoryWorkload for MemoryWorkload {
    fn category(&self) -> Category {
        Category::Memory
    }

    fn metric_names(&self) -> Vec<String> {
        vec!["allocation".into(), "bandwidth".into()]
    }

    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag> {
        let policy = profile.run_policy();
        let (rows, cols) = profile.memory_shape;
        let mut acc = ResultAccumulator::new();

        acc.measure("allocation", &policy, clock, || {
            let matrix = vec![0f64; rows * cols];
            black_box(&matrix);
            Ok(())
        })?;

        let src = vec![1u8; rows * cols];
        let mut dst = vec![0u8; rows * cols];
        acc.measure("bandwidth", &policy, clock, || {
            dst.copy_from_slice(black_box(&src));
            Ok(black_box(dst[dst.len() / 2]))
        })?;

        Ok(acc.into_bag())
    }
}

// ---------------------------------------------------------------------------
// GPU

/// No GPU compute backend is compiled in, so this category always reports
/// its capability as unavailable and the runner records a zero bag.
pub struct GpuWorkload;

impl CategoryWorkload for GpuWorkload {
    fn category(&self) -> Category {
        Category::Gpu
    }

    fn metric_names(&self) -> Vec<String> {
        vec!["tensor_operations".into(), "tiny_training_loop".into()]
    }

    fn run(&self, _profile: &ConfigProfile, _clock: &dyn Clock) -> BenchResult<ResultBag> {
        Err(BenchError::CapabilityUnavailable(
            "no GPU backend available (CUDA or Metal)".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Disk

/// Sequential write then read of one temporary file per run.
#[derive(Debug, Default)]
pub struct DiskWorkload {
    /// Directory for the scratch file; the system temp dir when unset
    pub dir: Option<PathBuf>,
}

impl DiskWorkload {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        DiskWorkload {
            dir: Some(dir.into()),
        }
    }

    fn scratch_file(&self) -> std::io::Result<tempfile::NamedTempFile> {
        match &self.dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
    }
}

impl CategoryWorkload for DiskWorkload {
    fn category(&self) -> Category {
        Category::Disk
    }

    fn metric_names(&self) -> Vec<String> {
        vec!["write_time".into(), "read_time".into()]
    }

    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag> {
        let policy = profile.run_policy();
        let mut payload = vec![0u8; profile.disk_file_size];
        StdRng::seed_from_u64(SEED).fill(&mut payload[..]);

        // one scratch file per run, created before any timing starts
        let mut files = (0..policy.n_runs)
            .map(|_| self.scratch_file())
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| BenchError::measurement("write_time", e))?;

        let mut acc = ResultAccumulator::new();
        let mut pending = files.iter_mut();
        acc.measure("write_time", &policy, clock, || {
            let file = pending
                .next()
                .ok_or_else(|| BenchError::measurement("write_time", "no scratch file left"))?;
            file.write_all(&payload)
                .and_then(|_| file.as_file().sync_all())
                .map_err(|e| BenchError::measurement("write_time", e))
        })?;

        let mut written = files.iter_mut();
        let mut back = Vec::with_capacity(payload.len());
        acc.measure("read_time", &policy, clock, || {
            let file = written
                .next()
                .ok_or_else(|| BenchError::measurement("read_time", "no scratch file left"))?;
            back.clear();
            file.seek(SeekFrom::Start(0))
                .and_then(|_| file.read_to_end(&mut back))
                .map_err(|e| BenchError::measurement("read_time", e))?;
            if back.len() != payload.len() {
                return Err(BenchError::measurement(
                    "read_time",
                    format!("short read: {} of {} bytes", back.len(), payload.len()),
                ));
            }
            Ok(())
        })?;

        Ok(acc.into_bag())
    }
}

// ---------------------------------------------------------------------------
// ML

/// Logistic regression on a synthetic, linearly separable dataset.
pub struct MlWorkload;

struct Dataset {
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

fn make_classification(n_samples: usize, n_features: usize) -> Dataset {
    let mut rng = StdRng::seed_from_u64(SEED);
    let plane: Vec<f64> = (0..n_features).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let mut x = Vec::with_capacity(n_samples);
    let mut y = Vec::with_capacity(n_samples);
    for _ in 0..n_samples {
        let row: Vec<f64> = (0..n_features).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let margin: f64 = row.iter().zip(&plane).map(|(a, b)| a * b).sum::<f64>()
            + rng.gen_range(-0.1..0.1);
        y.push(if margin > 0.0 { 1.0 } else { 0.0 });
        x.push(row);
    }
    Dataset { x, y }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn train_logistic(x: &[Vec<f64>], y: &[f64], epochs: usize, lr: f64) -> Vec<f64> {
    let n_features = x.first().map(|r| r.len()).unwrap_or(0);
    let mut w = vec![0.0; n_features + 1];
    let n = x.len().max(1) as f64;
    for _ in 0..epochs {
        let mut grad = vec![0.0; n_features + 1];
        for (row, target) in x.iter().zip(y) {
            let z = w[n_features] + row.iter().zip(&w).map(|(a, b)| a * b).sum::<f64>();
            let err = sigmoid(z) - target;
            for (g, v) in grad.iter_mut().zip(row) {
                *g += err * v;
            }
            grad[n_features] += err;
        }
        for (wi, gi) in w.iter_mut().zip(&grad) {
            *wi -= lr * gi / n;
        }
    }
    w
}

fn accuracy(w: &[f64], x: &[Vec<f64>], y: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let bias = w[w.len() - 1];
    let correct = x
        .iter()
        .zip(y)
        .filter(|(row, target)| {
            let z = bias + row.iter().zip(w).map(|(a, b)| a * b).sum::<f64>();
            (sigmoid(z) >= 0.5) == (**target >= 0.5)
        })
        .count();
    correct as f64 / x.len() as f64
}

impl CategoryWorkload for MlWorkload {
    fn category(&self) -> Category {
        Category::Ml
    }

    fn metric_names(&self) -> Vec<String> {
        vec!["model_accuracy".into()]
    }

    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag> {
        let policy = RunPolicy::median(profile.n_runs);
        let mut timings = ResultAccumulator::new();

        let data = timings.measure("create_dataset", &policy, clock, || {
            Ok(make_classification(profile.ml_n_samples, profile.ml_n_features))
        })?;
        let split = data.x.len() * 4 / 5;
        let (train_x, test_x) = data.x.split_at(split);
        let (train_y, test_y) = data.y.split_at(split);

        let weights = timings.measure("train_model", &policy, clock, || {
            Ok(train_logistic(train_x, train_y, 100, 0.5))
        })?;

        let mut bag = ResultBag::new();
        bag.insert("timings", timings.into_bag());
        bag.insert("model_accuracy", accuracy(&weights, test_x, test_y));
        Ok(bag)
    }
}

// ---------------------------------------------------------------------------
// Plot

/// Software rasterisation standing in for chart rendering.
pub struct PlotWorkload;

struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Canvas {
    fn new(width: usize, height: usize) -> Self {
        Canvas {
            width,
            height,
            pixels: vec![0xFFFF_FFFF; width * height],
        }
    }

    fn plot(&mut self, x: f64, y: f64, colour: u32) {
        let px = (x.clamp(0.0, 1.0) * (self.width - 1) as f64) as usize;
        let py = (y.clamp(0.0, 1.0) * (self.height - 1) as f64) as usize;
        self.pixels[py * self.width + px] = colour;
    }
}

fn render_downsampled(image: &[f32], shape: (usize, usize), out: usize) -> Vec<f32> {
    let (rows, cols) = shape;
    let out_rows = out.min(rows).max(1);
    let out_cols = out.min(cols).max(1);
    let (by, bx) = ((rows / out_rows).max(1), (cols / out_cols).max(1));
    let mut result = vec![0f32; out_rows * out_cols];
    for (i, cell) in result.iter_mut().enumerate() {
        let (oy, ox) = (i / out_cols, i % out_cols);
        let mut sum = 0f32;
        for y in oy * by..((oy + 1) * by).min(rows) {
            for x in ox * bx..((ox + 1) * bx).min(cols) {
                sum += image[y * cols + x];
            }
        }
        *cell = sum / (by * bx) as f32;
    }
    result
}

impl CategoryWorkload for PlotWorkload {
    fn category(&self) -> Category {
        Category::Plot
    }

    fn metric_names(&self) -> Vec<String> {
        vec![
            "generate_scatter_plot".into(),
            "animate_sine_wave".into(),
            "render_large_image".into(),
        ]
    }

    fn run(&self, profile: &ConfigProfile, clock: &dyn Clock) -> BenchResult<ResultBag> {
        let policy = profile.run_policy();
        let mut acc = ResultAccumulator::new();
        let mut rng = StdRng::seed_from_u64(SEED);

        acc.measure("generate_scatter_plot", &policy, clock, || {
            let mut canvas = Canvas::new(800, 600);
            for _ in 0..profile.plot_points {
                let (x, y) = (rng.r#gen::<f64>(), rng.r#gen::<f64>());
                canvas.plot(x, y, 0xFF1F_77B4);
            }
            Ok(black_box(canvas.pixels.len()))
        })?;

        acc.measure("animate_sine_wave", &policy, clock, || {
            let mut frames = 0usize;
            for frame in 0..profile.animation_frames {
                let mut canvas = Canvas::new(640, 480);
                let phase = frame as f64 / 10.0;
                for i in 0..1000 {
                    let t = i as f64 / 999.0;
                    let y = 0.5 + 0.45 * (t * std::f64::consts::TAU + phase).sin();
                    canvas.plot(t, y, 0xFF00_0000);
                }
                frames += black_box(canvas.height);
            }
            Ok(frames)
        })?;

        let (rows, cols) = profile.image_shape;
        acc.measure("render_large_image", &policy, clock, || {
            let image: Vec<f32> = (0..rows * cols).map(|_| rng.r#gen::<f32>()).collect();
            Ok(black_box(render_downsampled(&image, (rows, cols), 800)))
        })?;

        Ok(acc.into_bag())
    }
}
