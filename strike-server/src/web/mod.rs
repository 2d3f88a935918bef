//! Web server — live map page, WebSocket relay endpoint, stats API.
//!
//! Shared state holds the DB path (each handler opens its own connection),
//! the broadcast fan-out, and the relay buffer for the pending gauge.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::relay::RelayBuffer;
use crate::web::live::WsBroadcaster;

pub mod live;
pub mod pages;
pub mod routes;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct AppState {
    pub db_path: String,
    pub broadcaster: WsBroadcaster,
    pub relay: Arc<RelayBuffer>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", axum::routing::get(pages::page_map))
        .route("/ws", axum::routing::get(live::ws_subscribe))
        .route("/api/stats", axum::routing::get(routes::api_stats))
        .with_state(state)
        .layer(cors)
}

/// Start the web server.
pub async fn serve(state: Arc<AppState>, host: String, port: u16) {
    let app = build_router(state);
    let addr = format!("{host}:{port}");

    eprintln!("[web] dashboard listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
