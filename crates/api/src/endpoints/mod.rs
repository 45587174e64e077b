//! API endpoints.

mod auth;
mod health;
mod posts;
mod stats;
mod winners;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/posts", posts::router())
        .nest("/winners", winners::router())
        .nest("/stats", stats::router())
        .nest("/health", health::router())
}
