//! HTTP service for the local Secrets Manager endpoint

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::handle_request;
use crate::storage::SecretsManagerState;

/// Build the endpoint router: AWS JSON requests on `/`, liveness on `/health`
pub fn router(state: Arc<SecretsManagerState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", post(handle_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, r#"{"status": "running", "services": ["secretsmanager"]}"#)
}
