use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub alerts_count: i64,
    pub uptime_seconds: u64,
    pub timestamp: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(liveness))
        .route("/status", get(status))
}

async fn liveness() -> String {
    format!("Skyfare bot is running. Time: {}", Utc::now().to_rfc3339())
}

async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, AppError> {
    let alerts_count = state.alerts.count_all().await?;

    Ok(Json(StatusResponse {
        status: "ok",
        alerts_count,
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
    }))
}
