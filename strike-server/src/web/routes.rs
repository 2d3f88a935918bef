//! REST API route handlers.
//!
//! Each handler opens its own DB connection; the single long-lived writer
//! connection belongs to the feed client.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::db::Store;
use crate::web::AppState;

/// GET /api/stats — persisted row count plus live gauges.
pub async fn api_stats(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let stats = match Store::open(&state.db_path) {
        Ok(store) => store.stats(),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            );
        }
    };

    (
        StatusCode::OK,
        Json(json!({
            "strikes": stats.strikes,
            "last_received_at": stats.last_received_at,
            "subscribers": state.broadcaster.subscriber_count(),
            "pending_points": state.relay.pending_len(),
        })),
    )
}
