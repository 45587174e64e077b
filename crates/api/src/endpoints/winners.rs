//! Winner endpoints.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use iftar_common::{AppResult, DayWindow};
use iftar_core::{DailyWinner, HistoryEntry};
use serde::Deserialize;
use validator::Validate;

use crate::{middleware::AppState, response::ApiResponse};

/// Today's leading post and its announcement time.
async fn daily(State(state): State<AppState>) -> AppResult<ApiResponse<DailyWinner>> {
    let daily = state.winner_service.daily(Utc::now()).await?;
    Ok(ApiResponse::ok(daily))
}

/// History query.
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryQuery {
    #[validate(range(min = 1, max = 30))]
    pub days: Option<u32>,
}

/// Winners of previous days, most recent first.
async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<ApiResponse<Vec<HistoryEntry>>> {
    query.validate()?;

    let days = query
        .days
        .unwrap_or(state.config.competition.history_days);
    let history = state
        .winner_service
        .history(days, DayWindow::today())
        .await?;
    Ok(ApiResponse::ok(history))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/daily", get(daily))
        .route("/history", get(history))
}
