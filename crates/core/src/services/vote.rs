//! Vote service.

use chrono::Utc;
use iftar_common::{AppError, AppResult, IdGenerator};
use iftar_db::{
    entities::vote,
    repositories::{PostRepository, VoteRepository},
};
use sea_orm::Set;
use serde::Serialize;
use tracing::{debug, info};

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Added,
    Removed,
}

/// Result of toggling a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub action: VoteAction,
    pub post_id: String,
    /// Vote count read after the change.
    pub vote_count: u64,
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    vote_repo: VoteRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub fn new(vote_repo: VoteRepository, post_repo: PostRepository) -> Self {
        Self {
            vote_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Cast a vote, or withdraw it if one already exists.
    ///
    /// Uniqueness of `(user_id, post_id)` is left to the database: the
    /// existing vote is deleted in one statement, and otherwise the insert
    /// ignores a conflicting row written by a concurrent request.
    pub async fn toggle(&self, user_id: &str, post_id: &str) -> AppResult<VoteOutcome> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if post.user_id == user_id {
            return Err(AppError::InvalidOperation(
                "You cannot vote for your own post".to_string(),
            ));
        }

        let action = if self.vote_repo.remove(user_id, post_id).await? > 0 {
            VoteAction::Removed
        } else {
            let model = vote::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.to_string()),
                post_id: Set(post_id.to_string()),
                created_at: Set(Utc::now().into()),
            };

            if self.vote_repo.insert_if_absent(model).await? == 0 {
                debug!(user_id = %user_id, post_id = %post_id, "Vote already recorded by a concurrent request");
            }
            VoteAction::Added
        };

        let vote_count = self.vote_repo.count_by_post(post_id).await?;
        info!(user_id = %user_id, post_id = %post_id, ?action, vote_count, "Vote toggled");

        Ok(VoteOutcome {
            action,
            post_id: post_id.to_string(),
            vote_count,
        })
    }
}
