//! Cadence Web Server
//!
//! Axum-based REST API for triggering engine tasks and reading their results:
//! - Task endpoints run through the shared `TaskRunner` (queue limits, retries)
//! - Restrictive CORS policy
//! - Request tracing via `TraceLayer`
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use cadence_core::{Database, Engine, EngineConfig};

mod handlers;
mod scheduler;

pub use scheduler::{
    run_detection_sweep, start_detection_scheduler, DetectionScheduleConfig, SweepSummary,
};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Database,
    /// Shared with the detection scheduler so queue limits and account locks apply to both
    pub engine: Arc<Engine>,
}

/// Create the router for a database and an already-wired engine
pub fn create_router(db: Database, engine: Arc<Engine>, config: ServerConfig) -> Router {
    let state = Arc::new(AppState { db, engine });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/tasks/detect-recurring",
            post(handlers::trigger_detect_recurring),
        )
        .route(
            "/tasks/export-transactions",
            post(handlers::trigger_export_transactions),
        )
        .route("/accounts", get(handlers::list_accounts))
        .route("/accounts/:id/recurring", get(handlers::list_recurring))
        .route("/recurring/upcoming", get(handlers::list_upcoming))
        .route("/runs", get(handlers::list_runs))
        .route("/runs/:id", get(handlers::get_run));

    let methods = [Method::GET, Method::POST, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Start the server
pub async fn serve(
    db: Database,
    engine_config: &EngineConfig,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let engine = Arc::new(Engine::new(db.clone(), engine_config)?);

    // Start detection scheduler if configured
    if let Some(schedule) = DetectionScheduleConfig::from_env() {
        start_detection_scheduler(db.clone(), engine.clone(), schedule);
    }

    let app = create_router(db, engine, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map an engine error: validation is the caller's fault, missing records are 404
    pub fn from_engine(err: cadence_core::Error) -> Self {
        use cadence_core::Error;

        let mut root = &err;
        while let Error::Context { source, .. } = root {
            root = source.as_ref();
        }

        let mapped = match root {
            Error::Validation(msg) => Some(Self::bad_request(msg)),
            Error::NotFound(msg) => Some(Self::not_found(msg)),
            _ => None,
        };
        mapped.unwrap_or_else(|| err.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
