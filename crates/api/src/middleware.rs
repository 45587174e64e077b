//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use iftar_common::Config;
use iftar_core::{AccountService, PostService, StatsService, VoteService, WinnerService};
use sea_orm::DatabaseConnection;
use tracing::debug;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "iftar_session";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub account_service: AccountService,
    pub post_service: PostService,
    pub vote_service: VoteService,
    pub winner_service: WinnerService,
    pub stats_service: StatsService,
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<Config>,
    /// Name of the configured image storage backend.
    pub storage_backend: &'static str,
}

/// Session token from `Authorization: Bearer` or the session cookie.
fn session_token(req: &Request<Body>) -> Option<String> {
    if let Some(token) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    CookieJar::from_headers(req.headers())
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

/// Authentication middleware.
///
/// Resolves the session token and inserts the `user::Model` into the request
/// extensions. Requests without a valid session continue anonymously.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = session_token(&req) {
        match state.account_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) => debug!(error = %e, "Ignoring invalid session token"),
        }
    }

    next.run(req).await
}
