//! Post service: creation, deletion and the daily feed.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::{join_all, try_join_all};
use iftar_common::{AppError, AppResult, DayWindow, IdGenerator};
use iftar_db::{
    entities::{post, user},
    repositories::{PostRepository, PostWithVotes, VoteRepository},
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::storage::{StorageService, generate_storage_key, sniff_image_format};

/// Title used when a post is created without one.
pub const DEFAULT_TITLE: &str = "Iftar Photos";

/// Maximum page size for the feed.
pub const MAX_PAGE_SIZE: u64 = 50;

/// Highest feed page number accepted.
pub const MAX_PAGE: u64 = 1_000_000;

/// Input for creating a new post.
#[derive(Debug, Default, Validate)]
pub struct CreatePostInput {
    /// Raw image payloads in upload order.
    pub images: Vec<Bytes>,

    #[validate(length(max = 100))]
    pub title: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Owner fields shown next to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAuthor {
    pub id: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Public representation of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
    pub user: PostAuthor,
}

impl From<PostWithVotes> for PostView {
    fn from(row: PostWithVotes) -> Self {
        Self {
            image_urls: row.image_url_list(),
            id: row.id,
            title: row.title,
            description: row.description,
            created_at: row.created_at.with_timezone(&Utc),
            vote_count: row.vote_count,
            user: PostAuthor {
                id: row.user_id,
                name: row.user_name,
                avatar_url: row.user_avatar_url,
            },
        }
    }
}

impl PostView {
    /// View of a freshly created post.
    #[must_use]
    pub fn new_post(post: post::Model, author: &user::Model) -> Self {
        Self {
            image_urls: post.image_url_list(),
            id: post.id,
            title: post.title,
            description: post.description,
            created_at: post.created_at.with_timezone(&Utc),
            vote_count: 0,
            user: PostAuthor {
                id: author.id.clone(),
                name: author.name.clone(),
                avatar_url: author.avatar_url.clone(),
            },
        }
    }
}

/// One page of the feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<PostView>,
    /// True when the page came back full. A feed whose size is an exact
    /// multiple of the page size reports `true` on its last page.
    pub has_more: bool,
    pub page: u64,
    pub limit: u64,
}

/// Result of deleting a post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub post_id: String,
    pub votes_removed: u64,
    /// Storage keys whose deletion failed.
    pub orphaned_images: Vec<String>,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    vote_repo: VoteRepository,
    storage: StorageService,
    max_image_bytes: usize,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        vote_repo: VoteRepository,
        storage: StorageService,
        max_image_bytes: usize,
    ) -> Self {
        Self {
            post_repo,
            vote_repo,
            storage,
            max_image_bytes,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a post from uploaded images.
    ///
    /// Every image is size-checked and sniffed before anything is uploaded.
    /// Uploads run concurrently; if one fails the post is not created and
    /// images that did upload are left behind.
    pub async fn create(
        &self,
        author: &user::Model,
        input: CreatePostInput,
    ) -> AppResult<PostView> {
        input.validate()?;

        if input.images.is_empty() {
            return Err(AppError::InvalidOperation(
                "At least one image is required".to_string(),
            ));
        }

        let mut formats = Vec::with_capacity(input.images.len());
        for (index, data) in input.images.iter().enumerate() {
            if data.len() > self.max_image_bytes {
                return Err(AppError::PayloadTooLarge(format!(
                    "Image {} is {} bytes; the limit is {} bytes",
                    index + 1,
                    data.len(),
                    self.max_image_bytes
                )));
            }
            if data.is_empty() {
                return Err(AppError::InvalidOperation(format!(
                    "Image {} is empty",
                    index + 1
                )));
            }
            formats.push(sniff_image_format(data)?);
        }

        let post_id = self.id_gen.generate();

        let uploads = input
            .images
            .iter()
            .zip(&formats)
            .enumerate()
            .map(|(index, (data, format))| {
                let key = generate_storage_key(&format!("{post_id}-{index}"), *format);
                let storage = self.storage.clone();
                async move {
                    storage
                        .upload(&key, data, format.to_mime_type())
                        .await
                        .map_err(|e| match e {
                            AppError::UpstreamService(_) => e,
                            other => AppError::UpstreamService(other.to_string()),
                        })
                }
            });
        let stored = try_join_all(uploads).await?;

        let model = post::ActiveModel {
            id: Set(post_id),
            user_id: Set(author.id.clone()),
            title: Set(Some(normalize_title(input.title.as_deref()))),
            description: Set(normalize_text(input.description.as_deref())),
            image_urls: Set(serde_json::json!(
                stored.iter().map(|s| s.url.as_str()).collect::<Vec<_>>()
            )),
            image_keys: Set(serde_json::json!(
                stored.iter().map(|s| s.key.as_str()).collect::<Vec<_>>()
            )),
            created_at: Set(Utc::now().into()),
        };

        let created = self.post_repo.create(model).await?;
        info!(post_id = %created.id, user_id = %author.id, images = stored.len(), "Post created");

        Ok(PostView::new_post(created, author))
    }

    /// Delete a post owned by `user_id`.
    ///
    /// Hosted images are deleted concurrently with the rows. Image failures
    /// do not fail the call; their keys are reported as orphaned.
    pub async fn delete(&self, user_id: &str, post_id: &str) -> AppResult<DeleteOutcome> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.user_id != user_id {
            return Err(AppError::Unauthorized);
        }

        let keys = post.image_key_list();
        let images = join_all(keys.iter().map(|key| {
            let storage = self.storage.clone();
            async move { (key, storage.delete(key).await) }
        }));

        let rows = async {
            let votes_removed = self.vote_repo.delete_by_post(post_id).await?;
            self.post_repo.delete(post_id).await?;
            Ok::<_, AppError>(votes_removed)
        };

        let (image_results, rows_result) = tokio::join!(images, rows);

        let orphaned_images: Vec<String> = image_results
            .into_iter()
            .filter_map(|(key, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(post_id = %post_id, key = %key, error = %e, "Failed to delete image");
                    Some(key.clone())
                }
            })
            .collect();

        let votes_removed = rows_result?;
        info!(post_id = %post_id, votes_removed, "Post deleted");

        Ok(DeleteOutcome {
            post_id: post_id.to_string(),
            votes_removed,
            orphaned_images,
        })
    }

    /// A page of the feed for `window`, newest first.
    pub async fn list_posts(
        &self,
        page: u64,
        limit: u64,
        window: &DayWindow,
    ) -> AppResult<FeedPage> {
        if !(1..=MAX_PAGE).contains(&page) {
            return Err(AppError::Validation(format!(
                "page must be between 1 and {MAX_PAGE}"
            )));
        }
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        // Postgres binds OFFSET as a signed 64-bit integer.
        let offset = (page - 1)
            .checked_mul(limit)
            .filter(|offset| i64::try_from(*offset).is_ok())
            .ok_or_else(|| AppError::Validation("page is out of range".to_string()))?;
        let rows = self
            .post_repo
            .find_page_in_range(window.start(), window.end(), offset, limit)
            .await?;

        let has_more = rows.len() as u64 == limit;
        Ok(FeedPage {
            items: rows.into_iter().map(PostView::from).collect(),
            has_more,
            page,
            limit,
        })
    }
}

/// Trimmed title, falling back to [`DEFAULT_TITLE`].
fn normalize_title(title: Option<&str>) -> String {
    normalize_text(title).unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

fn normalize_text(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
}
