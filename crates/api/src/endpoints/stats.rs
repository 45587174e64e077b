//! Stats endpoints.

use axum::{
    Router,
    extract::State,
    routing::{delete, get},
};
use iftar_common::{AppResult, DayWindow};
use iftar_core::{CompetitionStats, ResetOutcome};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Today's activity counters.
async fn stats(State(state): State<AppState>) -> AppResult<ApiResponse<CompetitionStats>> {
    let stats = state.stats_service.stats(&DayWindow::today()).await?;
    Ok(ApiResponse::ok(stats))
}

/// Wipe today's posts and votes (admins only).
async fn reset(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ResetOutcome>> {
    let outcome = state
        .stats_service
        .reset(&user, &DayWindow::today())
        .await?;
    Ok(ApiResponse::ok(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(stats))
        .route("/reset", delete(reset))
}
