pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod session_store;
pub mod state;
pub mod sync;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use badcards_core::session::SessionError;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> Result<(Router<()>, AppState), SessionError> {
    let state = AppState::new(config)?;

    let api_routes = Router::new()
        .route("/sessions", post(api::create_session))
        .route("/sessions/{id}", get(api::get_session))
        .route("/sessions/{id}/join", post(api::request_join))
        .route("/sessions/{id}/approve", post(api::approve_join))
        .route("/sessions/{id}/deny", post(api::deny_join))
        .route("/sessions/{id}/spectate", post(api::spectate))
        .route("/sessions/{id}/leave", post(api::leave))
        .route("/sessions/{id}/round-win", post(api::record_round_win))
        .route("/sessions/{id}/restart", post(api::restart))
        .route("/sessions/{id}/chat-eligible", get(api::chat_eligible))
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .with_state(state.clone());

    Ok((app, state))
}

/// Background task that periodically evicts sessions with no subscribers
/// and no recent mutation.
pub fn spawn_idle_sweeper(state: AppState) {
    let interval = Duration::from_secs(state.config.sessions.idle_check_interval_secs);
    let max_idle = Duration::from_secs(state.config.sessions.idle_timeout_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let removed = {
                let mut store = state.store.write().await;
                store.cleanup_idle_sessions(max_idle)
            };
            if removed > 0 {
                tracing::info!(removed, "Idle session sweep");
            }
        }
    });
}
