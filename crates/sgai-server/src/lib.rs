pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use sgai_core::config::ServerConfig;
use sgai_core::paths::{EVENTS_PUBLISH_PATH, EVENTS_STREAM_PATH, HEALTH_PATH};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(EVENTS_STREAM_PATH, get(routes::events::stream_events))
        .route(EVENTS_PUBLISH_PATH, post(routes::events::publish_event))
        .route(HEALTH_PATH, get(routes::health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the event hub on `0.0.0.0:<config.port>`.
pub async fn serve(config: &ServerConfig) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(listener, AppState::from_config(config)).await
}

/// Start the event hub on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(listener: tokio::net::TcpListener, app_state: AppState) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(app_state);

    tracing::info!("sgai event hub listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
