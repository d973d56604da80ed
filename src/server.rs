//! HTTP run-status surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/pipeline/status` | `{"running": bool}` |
//! | `POST` | `/pipeline/run` | Run the pipeline; 200 report, 429 if a run is active, 500 report on failure |
//! | `GET`  | `/articles` | List articles, filtered by `category` / `status` query parameters |
//! | `POST` | `/articles/notebook` | Set the notebook link of an article by URL |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "already_running", "message": "pipeline already running" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `already_running`
//! (429), `internal` (500). A failed run is not an error body: it returns
//! 500 with the [`RunReport`] itself so partial counts reach the caller.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::articles;
use crate::config::Config;
use crate::models::ArticleRecord;
use crate::pipeline::{Pipeline, RunGate, RunReport};
use crate::store::UpdateOutcome;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    gate: RunGate,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            gate: RunGate::new(),
        }
    }

    pub fn gate(&self) -> &RunGate {
        &self.gate
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/pipeline/status", get(handle_status))
        .route("/pipeline/run", post(handle_run))
        .route("/articles", get(handle_list))
        .route("/articles/notebook", post(handle_notebook))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `config.server.bind`.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pipeline = Pipeline::open(config).await?;
    let app = router(AppState::new(Arc::new(pipeline)));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("News Ledger listening on http://{}", bind_addr);
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
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
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
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /pipeline/status ============

#[derive(Serialize)]
struct StatusResponse {
    running: bool,
}

async fn handle_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        running: state.gate.is_running(),
    })
}

// ============ POST /pipeline/run ============

#[derive(Deserialize, Default)]
struct RunRequest {
    #[serde(default)]
    user_id: Option<String>,
}

/// Triggers a run. The run itself is spawned so a dropped connection cannot
/// cancel it halfway.
async fn handle_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<RunReport>), AppError> {
    let Some(permit) = state.gate.try_acquire() else {
        return Err(AppError {
            status: StatusCode::TOO_MANY_REQUESTS,
            code: "already_running",
            message: "pipeline already running".to_string(),
        });
    };

    let pipeline = state.pipeline.clone();
    let user_id = request
        .user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| pipeline.config().pipeline.user_id.clone());

    let report = tokio::spawn(async move {
        let report = pipeline.run(&user_id).await;
        drop(permit);
        report
    })
    .await
    .map_err(|e| internal(anyhow::anyhow!("pipeline task failed: {}", e)))?;

    let status = if report.is_success() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)))
}

// ============ GET /articles ============

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
    status: Option<String>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ArticleRecord>>, AppError> {
    let filter = articles::parse_filter(query.category.as_deref(), query.status.as_deref())
        .map_err(|e| bad_request(e.to_string()))?;
    let records = articles::list_articles(state.pipeline.articles(), &filter)
        .await
        .map_err(internal)?;
    Ok(Json(records))
}

// ============ POST /articles/notebook ============

#[derive(Deserialize)]
struct NotebookRequest {
    url: String,
    notebook_link: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct UpdateResponse {
    result: &'static str,
}

async fn handle_notebook(
    State(state): State<AppState>,
    Json(request): Json<NotebookRequest>,
) -> Result<Json<UpdateResponse>, AppError> {
    if request.url.trim().is_empty() || request.notebook_link.trim().is_empty() {
        return Err(bad_request("url and notebook_link must not be empty"));
    }
    let user_id = request
        .user_id
        .unwrap_or_else(|| state.pipeline.config().pipeline.user_id.clone());

    let outcome = articles::update_notebook_link(
        state.pipeline.articles(),
        &request.url,
        &request.notebook_link,
        &user_id,
    )
    .await
    .map_err(internal)?;

    if outcome == UpdateOutcome::NotFound {
        return Err(not_found(format!("no article with url {}", request.url.trim())));
    }
    Ok(Json(UpdateResponse {
        result: articles::describe_update(outcome),
    }))
}
