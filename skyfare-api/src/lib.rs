use axum::Router;
use tower_http::trace::TraceLayer;

pub mod bot;
pub mod commands;
pub mod error;
pub mod health;
pub mod messages;
pub mod provider;
pub mod search;
pub mod state;
pub mod telegram;
pub mod worker;

pub use state::AppState;

/// HTTP surface of the service: liveness and status only.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
