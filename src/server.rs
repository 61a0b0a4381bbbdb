//! HTTP API server.
//!
//! Exposes one operation — ask a grounded question — plus a health check.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/agent` | Ask a question, grounded in retrieved posts |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Error responses are JSON:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! A blank question is a `400`; everything else that fails server-side is
//! a `500` with a diagnostic message. Per-request failures never take the
//! process down. All origins are permitted (CORS) so browser clients can
//! call the API directly.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::answer;
use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::migrate;
use crate::models::RetrievedDocument;

/// Shared application state, built once at startup. The pool and the
/// embedding provider are process-wide singletons from here on — request
/// handlers share them by `Arc`, never construct their own.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    provider: Arc<dyn EmbeddingProvider>,
}

/// Install the tracing subscriber for long-running commands.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("postmind=info,tower_http=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Start the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    // Schema creation is idempotent; serving never races it.
    migrate::run_migrations(config).await?;

    let pool = db::connect(config).await?;
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        provider,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/agent", post(handle_agent))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/agent ============

#[derive(Deserialize)]
struct AgentRequest {
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct AgentResponse {
    model_id: String,
    answer: String,
    retrieved: RetrievedEnvelope,
}

#[derive(Serialize)]
struct RetrievedEnvelope {
    social: Vec<RetrievedDocument>,
}

async fn handle_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let model_id = request
        .model_id
        .unwrap_or_else(|| state.config.generation.default_model_id.clone());
    let k = request.k.unwrap_or(state.config.retrieval.default_k);

    tracing::info!(model_id = %model_id, k, "agent request");

    let result = answer::answer_question(
        &state.pool,
        &state.config,
        state.provider.as_ref(),
        &question,
        &model_id,
        k,
    )
    .await
    .map_err(|e| internal_error(format!("{:#}", e)))?;

    Ok(Json(AgentResponse {
        model_id: result.model_id,
        answer: result.answer,
        retrieved: RetrievedEnvelope {
            social: result.retrieved,
        },
    }))
}
