use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::error;

use huddle_types::api::{HealthResponse, HistoryQuery};
use huddle_types::models::Message;

use crate::auth::AppState;

/// Recent channel history, oldest first. The coordinator caps the limit at
/// the snapshot size.
pub async fn recent_messages(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let messages = state
        .coordinator
        .recent_messages(query.limit)
        .await
        .map_err(|e| {
            error!("Failed to load recent messages: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(messages))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let connections = state
        .coordinator
        .connection_count()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    Ok(Json(HealthResponse {
        status: "alive".into(),
        connections,
    }))
}
