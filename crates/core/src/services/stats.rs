//! Competition statistics and the admin reset.

use futures::future::join_all;
use iftar_common::{AppError, AppResult, DayWindow};
use iftar_db::{
    entities::user,
    repositories::{PostRepository, UserRepository, VoteRepository},
};
use serde::Serialize;
use tracing::{info, warn};

use crate::services::storage::StorageService;

/// Activity counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompetitionStats {
    /// Posts created in the window.
    pub posts: u64,
    /// Votes cast in the window.
    pub votes: u64,
    /// Registered users overall.
    pub users: u64,
}

/// Result of wiping a day's data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub posts_deleted: u64,
    pub votes_deleted: u64,
    pub orphaned_images: Vec<String>,
}

/// Stats service.
#[derive(Clone)]
pub struct StatsService {
    post_repo: PostRepository,
    vote_repo: VoteRepository,
    user_repo: UserRepository,
    storage: StorageService,
}

impl StatsService {
    /// Create a new stats service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        vote_repo: VoteRepository,
        user_repo: UserRepository,
        storage: StorageService,
    ) -> Self {
        Self {
            post_repo,
            vote_repo,
            user_repo,
            storage,
        }
    }

    /// Counters for a day window.
    pub async fn stats(&self, window: &DayWindow) -> AppResult<CompetitionStats> {
        let (posts, votes, users) = tokio::try_join!(
            self.post_repo.count_in_window(window),
            self.vote_repo.count_in_window(window),
            self.user_repo.count(),
        )?;

        Ok(CompetitionStats {
            posts,
            votes,
            users,
        })
    }

    /// Delete every post and vote created in `window`. Admins only.
    pub async fn reset(&self, actor: &user::Model, window: &DayWindow) -> AppResult<ResetOutcome> {
        if !actor.is_admin {
            return Err(AppError::Forbidden(
                "Only administrators can reset the competition".to_string(),
            ));
        }

        let posts = self.post_repo.find_in_window(window).await?;
        let votes_deleted = self.vote_repo.delete_in_window(window).await?;
        let posts_deleted = self.post_repo.delete_in_window(window).await?;

        let keys: Vec<String> = posts.iter().flat_map(|p| p.image_key_list()).collect();
        let results = join_all(keys.iter().map(|key| self.storage.delete(key))).await;

        let orphaned_images: Vec<String> = keys
            .into_iter()
            .zip(results)
            .filter_map(|(key, result)| match result {
                Ok(()) => None,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to delete image during reset");
                    Some(key)
                }
            })
            .collect();

        info!(
            admin_id = %actor.id,
            date = %window.date(),
            posts_deleted,
            votes_deleted,
            "Competition day reset"
        );

        Ok(ResetOutcome {
            posts_deleted,
            votes_deleted,
            orphaned_images,
        })
    }
}
