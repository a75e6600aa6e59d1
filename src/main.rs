mod config;
mod http;
mod llm;
mod metrics;
mod models;
mod pipeline;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use config::{Config, SERVICE_NAME};
use models::{ApiError, RunPipelineRequest, RunPipelineResponse};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "owlow.api", "server crashed: {err:#}");
    }
}

async fn run() -> eyre::Result<()> {
    let _ = dotenvy::dotenv();
    let config = Arc::new(Config::from_env());
    init_tracing(config.debug);
    info!(
        target = "owlow.api",
        source_url = %config.owl_api_url,
        llm_enabled = config.llm_enabled,
        llm_model = %config.llm_model,
        embeddings = config.embedding_api_url.is_some(),
        max_images = config.max_images,
        max_image_size = config.max_image_size,
        "configuration loaded"
    );

    let pipeline = match Pipeline::from_config(config.clone()) {
        Ok(pipeline) => Some(pipeline),
        Err(err) => {
            error!(target = "owlow.api", error = %err, "pipeline could not be assembled");
            None
        }
    };
    let app = router(AppState {
        config: config.clone(),
        pipeline,
    });

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(target = "owlow.api", "listening on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    /// `None` when startup could not build the pipeline; runs then answer 500.
    pipeline: Option<Pipeline>,
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health))
        .route("/run_pipeline", post(run_pipeline))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check, safe to call during startup.
///
/// - Method: `GET`
/// - Path: `/health`
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "llm_enabled": state.config.llm_enabled,
    }))
}

/// Run fetch → preprocess → analyze → recommend and return counts plus the
/// top ranked listings.
///
/// - Method: `POST`
/// - Path: `/run_pipeline`
/// - Body: `RunPipelineRequest`
/// - Response: `RunPipelineResponse`
async fn run_pipeline(
    State(state): State<AppState>,
    payload: Result<Json<RunPipelineRequest>, JsonRejection>,
) -> Result<Json<RunPipelineResponse>, AppError> {
    crate::metrics::inc_requests("/run_pipeline");
    let Json(request) =
        payload.map_err(|err| PipelineError::invalid_input("request", err.body_text()))?;
    let Some(pipeline) = &state.pipeline else {
        error!(target = "owlow.api", "pipeline modules missing");
        return Err(PipelineError::collaborators_missing().into());
    };
    let response = pipeline.run(request).await?;
    Ok(Json(response))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(target = "owlow.api", error = %err, "pipeline request failed");
                }
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "debug"
    } else {
        "info,tower_http=debug"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt().with_env_filter(filter).try_init();
}
