//! `serve`: run the leaderboard service.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::server::{ServerConfig, serve};
use crate::{BenchError, BenchResult};

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct ServeOverrides {
    pub addr: Option<SocketAddr>,
    pub store: Option<PathBuf>,
    pub tolerance: Option<f64>,
}

pub fn resolve_config(
    config: Option<PathBuf>,
    overrides: ServeOverrides,
) -> BenchResult<ServerConfig> {
    let mut cfg = match config {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = overrides.addr {
        cfg.addr = addr;
    }
    if let Some(store) = overrides.store {
        cfg.store_path = store;
    }
    if let Some(tolerance) = overrides.tolerance {
        cfg.tolerance = tolerance;
    }
    cfg.validate()?;
    Ok(cfg)
}

pub fn run(config: Option<PathBuf>, overrides: ServeOverrides) -> BenchResult<()> {
    let cfg = resolve_config(config, overrides)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| BenchError::Message(format!("failed to start runtime: {e}")))?;
    runtime.block_on(serve(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("benchhub.toml");
        std::fs::write(&path, "[server]\ntolerance = 0.2\nstore_path = \"a.jsonl\"\n").unwrap();

        let cfg = resolve_config(
            Some(path),
            ServeOverrides {
                store: Some(PathBuf::from("b.jsonl")),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.tolerance, 0.2);
        assert_eq!(cfg.store_path, PathBuf::from("b.jsonl"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = ServeOverrides {
            tolerance: Some(0.0),
            ..Default::default()
        };
        assert!(resolve_config(None, overrides).is_err());
    }
}
