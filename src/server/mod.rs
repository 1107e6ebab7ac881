//! HTTP surface of the leaderboard service.
//!
//! `POST /api/submit`, `GET /api/leaderboard` and `GET /api/stats`.
//! Error bodies are `{"error": {...}}` where the inner object is the
//! serialised [`Rejection`] or a `{kind, message}` pair.

pub mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{LeaderboardRecord, ProfileName};
use crate::storage::{JsonlStore, LeaderboardQuery, LeaderboardStats, LeaderboardStore};
use crate::verify::{Gateway, RateLimiter, Receipt, Rejection, Stage};
use crate::{BenchError, BenchResult};

pub use config::ServerConfig;

/// Shared handler state.
pub struct AppState {
    pub gateway: Gateway,
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn LeaderboardStore>, config: &ServerConfig) -> Self {
        AppState {
            gateway: Gateway::new(store, config.verification_policy())
                .with_rate_limiter(RateLimiter::new(config.rate_limit)),
            trust_forwarded_for: config.trust_forwarded_for,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/submit", post(submit))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/stats", get(stats))
        .with_state(state)
}

/// Open the configured store and serve until the listener fails.
pub async fn serve(config: ServerConfig) -> BenchResult<()> {
    config.validate()?;
    let store = JsonlStore::open(&config.store_path)?;
    let state = Arc::new(AppState::new(Arc::new(store), &config));

    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|e| BenchError::Message(format!("failed to bind {}: {e}", config.addr)))?;
    info!(addr = %config.addr, store = %config.store_path.display(), "leaderboard listening");

    let pruner = state.clone();
    let every = Duration::from_secs(config.rate_limit.window_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            pruner.gateway.prune_rate_limits();
        }
    });

    serve_on(listener, state).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(listener: TcpListener, state: Arc<AppState>) -> BenchResult<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| BenchError::Message(format!("server error: {e}")))
}

/// Rate-limit key: the peer address, or the first `x-forwarded-for` hop when
/// the deployment trusts that header.
fn client_source(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    forwarded
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Receipt>), ApiError> {
    let source = client_source(
        &headers,
        peer.map(|ConnectInfo(addr)| addr),
        state.trust_forwarded_for,
    );
    let raw: Value = serde_json::from_slice(&body).map_err(|e| {
        BenchError::Rejected(Rejection::Structural {
            field: "body".to_string(),
            reason: format!("invalid JSON: {e}"),
        })
    })?;

    let receipt = tokio::task::spawn_blocking(move || state.gateway.submit_json(&source, raw))
        .await
        .map_err(|e| BenchError::Message(format!("submission task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub config_name: Option<String>,
    pub limit: Option<usize>,
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
    params: Result<Query<LeaderboardParams>, QueryRejection>,
) -> Result<Json<Vec<LeaderboardRecord>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let config_name = params
        .config_name
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ProfileName>())
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let query = LeaderboardQuery {
        config_name,
        limit: params.limit,
    };
    Ok(Json(state.gateway.store().query(&query)?))
}

async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<LeaderboardStats>, ApiError> {
    Ok(Json(state.gateway.store().stats()?))
}

/// Error response for every handler.
#[derive(Debug)]
pub enum ApiError {
    Bench(BenchError),
    BadRequest(String),
}

impl From<BenchError> for ApiError {
    fn from(e: BenchError) -> Self {
        ApiError::Bench(e)
    }
}

fn error_body(kind: &str, message: impl ToString) -> Value {
    json!({ "error": { "kind": kind, "message": message.to_string() } })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            ApiError::BadRequest(message) => {
                return (StatusCode::BAD_REQUEST, Json(error_body("bad_request", message)))
                    .into_response();
            }
            ApiError::Bench(e) => e,
        };

        match e {
            BenchError::Rejected(rejection) => {
                let status = match rejection.stage() {
                    Stage::Structural => StatusCode::BAD_REQUEST,
                    Stage::Plausibility | Stage::Tolerance => StatusCode::UNPROCESSABLE_ENTITY,
                    Stage::Uniqueness => StatusCode::CONFLICT,
                };
                let mut detail = serde_json::to_value(&rejection).unwrap_or(Value::Null);
                if let Some(obj) = detail.as_object_mut() {
                    obj.insert("stage".into(), json!(rejection.stage()));
                    obj.insert("message".into(), json!(rejection.to_string()));
                }
                (status, Json(json!({ "error": detail }))).into_response()
            }
            BenchError::RateLimited {
                ref client,
                retry_after_secs,
            } => {
                let body = json!({ "error": {
                    "kind": "rate_limited",
                    "message": e.to_string(),
                    "client": client,
                    "retry_after_secs": retry_after_secs,
                }});
                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                response
            }
            BenchError::StorageUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(error_body("storage_unavailable", &e)),
            )
                .into_response(),
            other => {
                error!(error = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(error_body("internal", &other)),
                )
                    .into_response()
            }
        }
    }
}
