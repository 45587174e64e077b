//! Post, feed and vote endpoints.

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use iftar_common::{AppError, AppResult, DayWindow};
use iftar_core::{CreatePostInput, DeleteOutcome, FeedPage, PostView, VoteOutcome};
use serde::Deserialize;
use tracing::debug;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Request body ceiling for uploads; each image is further capped by
/// `competition.max_image_bytes`.
const MAX_UPLOAD_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Feed query.
#[derive(Debug, Deserialize, Validate)]
pub struct FeedQuery {
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u64>,
}

/// Today's feed, newest first.
async fn list(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> AppResult<ApiResponse<FeedPage>> {
    query.validate()?;

    let page = query.page.unwrap_or(1);
    let limit = query
        .limit
        .unwrap_or(state.config.competition.feed_page_size);

    let feed = state
        .post_service
        .list_posts(page, limit, &DayWindow::today())
        .await?;

    Ok(ApiResponse::ok(feed))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::InvalidOperation(format!("Invalid upload: {}", e.body_text()))
    }
}

/// Read the multipart form: repeated `images` plus optional `title` and
/// `description`.
async fn read_post_form(mut multipart: Multipart) -> AppResult<CreatePostInput> {
    let mut input = CreatePostInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("images" | "images[]") => {
                input
                    .images
                    .push(field.bytes().await.map_err(multipart_error)?);
            }
            Some("title") => input.title = Some(field.text().await.map_err(multipart_error)?),
            Some("description") => {
                input.description = Some(field.text().await.map_err(multipart_error)?);
            }
            other => debug!(field = ?other, "Ignoring unknown form field"),
        }
    }

    Ok(input)
}

/// Create a post from uploaded photos.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<ApiResponse<PostView>> {
    let input = read_post_form(multipart).await?;
    let post = state.post_service.create(&user, input).await?;
    Ok(ApiResponse::created(post))
}

/// Delete query.
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub id: Option<String>,
}

/// Delete one of the caller's posts.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> AppResult<ApiResponse<DeleteOutcome>> {
    let post_id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::InvalidOperation("Post ID is required".to_string()))?;

    let outcome = state.post_service.delete(&user.id, &post_id).await?;
    Ok(ApiResponse::ok(outcome))
}

/// Toggle the caller's vote on a post.
async fn vote(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<ApiResponse<VoteOutcome>> {
    let outcome = state.vote_service.toggle(&user.id, &post_id).await?;
    Ok(ApiResponse::ok(outcome))
}

/// Trending query.
#[derive(Debug, Deserialize, Validate)]
pub struct TrendingQuery {
    #[validate(range(min = 1, max = 168))]
    pub hours: Option<i64>,

    #[validate(range(min = 1, max = 50))]
    pub limit: Option<u64>,
}

/// Posts from the last hours ranked by votes.
async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> AppResult<ApiResponse<Vec<PostView>>> {
    query.validate()?;

    let hours = query
        .hours
        .unwrap_or(state.config.competition.trending_hours);
    let limit = query
        .limit
        .unwrap_or(state.config.competition.trending_limit);

    let posts = state
        .winner_service
        .trending(hours, limit, Utc::now())
        .await?;
    Ok(ApiResponse::ok(posts))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list)
                .post(create)
                .delete(delete)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
        )
        .route("/trending", get(trending))
        .route("/{id}/vote", post(vote))
}
