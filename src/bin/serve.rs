//! HTTP API over the demand service
//!
//! Usage: cargo run --bin serve -- --config transit_demand.toml
//!
//! Endpoints:
//!   POST /predict             - Predict boardings/alightings for a stop context
//!   GET  /metrics             - Held-out metrics of the loaded models
//!   GET  /feature-importance  - Feature importance of the loaded models
//!   GET  /health              - Liveness and model status

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use transit_demand::config::load_config;
use transit_demand::features::RawContext;
use transit_demand::service::{
    DemandService, ErrorResponse, FeatureImportanceResponse, HealthResponse, MetricsResponse,
    PredictResponse,
};
use transit_demand::Error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve passenger demand predictions over HTTP")]
struct Args {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "transit_demand.toml")]
    config: PathBuf,

    /// Bundle directory, overrides `store.model_dir`
    #[arg(short, long)]
    models: Option<PathBuf>,
}

type AppState = Arc<DemandService>;

/// Engine error rendered as the JSON error envelope
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse::from(&self.0);
        let status = StatusCode::from_u16(body.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

async fn predict(
    State(service): State<AppState>,
    payload: std::result::Result<Json<RawContext>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(ctx) = payload.map_err(|rejection| Error::MalformedRequest(rejection.body_text()))?;
    Ok(Json(service.predict(&ctx)?))
}

async fn metrics(State(service): State<AppState>) -> Result<Json<MetricsResponse>, ApiError> {
    Ok(Json(service.metrics()?))
}

async fn feature_importance(
    State(service): State<AppState>,
) -> Result<Json<FeatureImportanceResponse>, ApiError> {
    Ok(Json(service.feature_importance()?))
}

async fn health(State(service): State<AppState>) -> Json<HealthResponse> {
    Json(service.health())
}

fn app(service: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/predict", post(predict))
        .route("/metrics", get(metrics))
        .route("/feature-importance", get(feature_importance))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transit_demand=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = load_config(&args.config)
        .and_then(|c| c.with_env_overrides())
        .with_context(|| format!("Failed to load config {:?}", args.config))?;
    if let Some(models) = args.models {
        config.store.model_dir = models;
    }

    let service = Arc::new(DemandService::from_config(&config));
    if service.try_load() {
        info!("Loaded model bundle from {:?}", config.store.model_dir);
    }

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("transit_demand v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    axum::serve(listener, app(service)).await?;

    Ok(())
}
