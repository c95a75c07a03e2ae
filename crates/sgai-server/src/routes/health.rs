use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/v1/health: liveness plus the number of open event streams.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "subscribers": app.subscriber_count(),
    }))
}
