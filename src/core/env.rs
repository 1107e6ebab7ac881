//! System-info detection for the submission envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys stripped from the descriptor before results are shared.
pub const PRIVATE_KEYS: &[&str] = &["hostname", "user"];

/// Hardware descriptor attached to every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,

    pub architecture: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_model: Option<String>,

    /// Logical cores
    pub cpu_count: usize,

    /// Physical cores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<usize>,

    pub memory_gb: f64,

    /// Compute backend used by the GPU category, or why there is none
    pub gpu_backend: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Default for SystemInfo {
    fn default() -> Self {
        SystemInfo {
            os: std::env::consts::OS.to_string(),
            os_version: None,
            architecture: std::env::consts::ARCH.to_string(),
            cpu_model: None,
            cpu_count: 0,
            cpu_cores: None,
            memory_gb: 0.0,
            gpu_backend: "unknown".to_string(),
            hostname: None,
            user: None,
        }
    }
}

impl SystemInfo {
    /// Detect system information from the current host
    pub fn detect() -> Self {
        use sysinfo::System;

        let mut sys = System::new_all();
        sys.refresh_all();

        let cpu_model = sys.cpus().first().map(|c| c.brand().trim().to_string());
        let cpu_count = sys.cpus().len();
        let cpu_cores = sys.physical_core_count();
        let memory_gb = round2(sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0));
        let os = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());

        SystemInfo {
            os,
            os_version: System::os_version(),
            architecture: std::env::consts::ARCH.to_string(),
            cpu_model,
            cpu_count,
            cpu_cores,
            memory_gb,
            gpu_backend: "none: no GPU compute backend compiled in".to_string(),
            hostname: System::host_name(),
            user: detect_user(),
        }
    }

    /// Opaque JSON descriptor as carried in the envelope.
    pub fn to_descriptor(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn detect_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Remove identifying keys from a system-info descriptor.
pub fn anonymise(descriptor: &mut Value) {
    if let Some(map) = descriptor.as_object_mut() {
        for key in PRIVATE_KEYS {
            map.remove(*key);
        }
    }
}
