//! HTTP surface: `POST /predict` and `GET /health`.
//!
//! The router holds one shared [`BatchHandler`]; requests are independent and
//! may run concurrently. Malformed envelopes are rejected by axum's `Json`
//! extractor with a 4xx before reaching the handler. Any processing error is
//! a `500` with a JSON `{error, message}` body and no predictions.

use crate::batch::{BatchHandler, PredictRequest, PredictResponse};
use crate::config::ServiceConfig;
use crate::engine::ConversionEngine;
use crate::error::Pdf2TextError;
use crate::transient::TransientStore;
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared per-process state.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<BatchHandler>,
}

/// Build the batch handler described by `config` around `engine`.
pub fn build_handler(config: &ServiceConfig, engine: Arc<dyn ConversionEngine>) -> BatchHandler {
    BatchHandler::new(
        engine,
        TransientStore::new(&config.temp_dir),
        config.defaults.clone(),
        config.failure_mode,
    )
}

/// Build the application router.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, Pdf2TextError> {
    let response = state.handler.handle(request).await?;
    Ok(Json(response))
}

async fn health() -> Json<Value> {
    Json(json!({}))
}

/// Bind `config.listen_addr()` and serve until Ctrl+C or SIGTERM.
///
/// In-flight requests finish before this returns, so their transient files
/// are released.
pub async fn serve(
    config: ServiceConfig,
    engine: Arc<dyn ConversionEngine>,
) -> Result<(), Pdf2TextError> {
    let addr = config.listen_addr();
    let state = AppState {
        handler: Arc::new(build_handler(&config, engine)),
    };
    let failure_mode = state.handler.failure_mode();
    let app = router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Pdf2TextError::Server { addr, source })?;
    info!(
        "pdf2text listening on {} (temp dir {}, failure mode {:?})",
        addr,
        config.temp_dir.display(),
        failure_mode
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|source| Pdf2TextError::Server { addr, source })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting graceful shutdown..."),
    }
}
