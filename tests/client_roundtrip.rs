//! Blocking client against a live server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::mpsc;

use bench_hub::client::LeaderboardClient;
use bench_hub::core::{BenchmarkResults, ProfileName, SubmissionEnvelope};
use bench_hub::score::score_results;
use bench_hub::server::{AppState, ServerConfig, serve_on};
use bench_hub::storage::{LeaderboardQuery, MemoryStore};
use bench_hub::verify::RateLimitPolicy;
use bench_hub::{BenchError, Rejection};
use serde_json::json;

/// Start a server on its own runtime thread and return its base URL.
fn spawn_server(config: ServerConfig) -> String {
    let (tx, rx) = mpsc::channel::<SocketAddr>();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), &config));
            serve_on(listener, state).await.unwrap();
        });
    });
    format!("http://{}", rx.recv().unwrap())
}

fn envelope(profile: ProfileName, primes: f64) -> SubmissionEnvelope {
    let results = BenchmarkResults {
        cpu: [("calculate_primes", primes)].into_iter().collect(),
        gpu: [("tensor_operations", 0.0)].into_iter().collect(),
        memory: [("bandwidth", 0.5)].into_iter().collect(),
        ..Default::default()
    };
    let index = score_results(&results).reference_index;
    SubmissionEnvelope::new(json!({"os": "Linux"}), results, index, profile)
}

#[test]
fn test_submit_then_read_back() {
    let client = LeaderboardClient::new(&spawn_server(ServerConfig::default())).unwrap();

    let env = envelope(ProfileName::Heavy, 0.4);
    let receipt = client.submit(&env).unwrap();
    assert_eq!(receipt.id, 1);
    assert_eq!(receipt.uuid, env.uuid);
    client.submit(&envelope(ProfileName::Light, 0.2)).unwrap();

    let heavy = client
        .leaderboard(&LeaderboardQuery::profile(ProfileName::Heavy))
        .unwrap();
    assert_eq!(heavy.len(), 1);
    assert_eq!(heavy[0].uuid, env.uuid);

    let stats = client.stats().unwrap();
    assert_eq!(stats.total, 2);
}

#[test]
fn test_rejection_maps_back_to_typed_error() {
    let client = LeaderboardClient::new(&spawn_server(ServerConfig::default())).unwrap();

    let mut env = envelope(ProfileName::Standard, 0.4);
    env.reference_index *= 2.0;
    match client.submit(&env).unwrap_err() {
        BenchError::Rejected(Rejection::ScoreMismatch { declared, .. }) => {
            assert!((declared - env.reference_index).abs() < 1e-6);
        }
        other => panic!("expected score mismatch, got {other:?}"),
    }

    let env = envelope(ProfileName::Standard, 0.4);
    client.submit(&env).unwrap();
    let err = client.submit(&env).unwrap_err();
    assert!(matches!(err, BenchError::Rejected(Rejection::DuplicateUuid { .. })));
    assert!(!err.is_retryable());
}

#[test]
fn test_rate_limit_is_retryable() {
    let config = ServerConfig {
        rate_limit: RateLimitPolicy {
            max_submissions: 1,
            window_secs: 120,
        },
        ..Default::default()
    };
    let client = LeaderboardClient::new(&spawn_server(config)).unwrap();

    client.submit(&envelope(ProfileName::Light, 0.4)).unwrap();
    let err = client.submit(&envelope(ProfileName::Light, 0.3)).unwrap_err();
    match &err {
        BenchError::RateLimited {
            client,
            retry_after_secs,
        } => {
            assert_eq!(client, "127.0.0.1");
            assert!(*retry_after_secs >= 1);
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
    assert!(err.is_retryable());
}

#[test]
fn test_unreachable_server_is_storage_unavailable() {
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    // listener dropped; nothing accepts on this port
    let client = LeaderboardClient::new(&format!("http://{addr}")).unwrap();
    let err = client.stats().unwrap_err();
    assert!(matches!(err, BenchError::StorageUnavailable(_)));
    assert!(err.is_retryable());
}
