pub mod generation_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

pub use middleware::require_auth;
pub use rest::{delete_faq_handler, get_faq_handler, list_faqs_handler, statistics_handler};
pub use ws_handler::ws_handler;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use state::AppState;
use std::sync::Arc;

/// Builds the authenticated API routes. Every route requires a resolved identity.
pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/faqs", get(list_faqs_handler))
        .route("/faqs/statistics", get(statistics_handler))
        .route("/faqs/{id}", get(get_faq_handler).delete(delete_faq_handler))
        .layer(from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state)
}
