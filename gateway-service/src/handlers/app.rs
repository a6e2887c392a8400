use crate::AppState;
use axum::{extract::State, response::IntoResponse};

pub async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus exposition of the metrics the shared middleware records.
/// Renders empty until a recorder is installed (tests skip installation).
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
