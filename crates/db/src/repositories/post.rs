//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post, user, vote};
use chrono::{DateTime, FixedOffset, Utc};
use iftar_common::{AppError, AppResult, DayWindow};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select,
    prelude::Json, sea_query::Expr,
};
use serde::Serialize;

/// A post joined with its owner's display fields and its live vote count.
#[derive(Clone, Debug, PartialEq, Eq, FromQueryResult, Serialize)]
pub struct PostWithVotes {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_urls: Json,
    pub image_keys: Json,
    pub created_at: DateTime<FixedOffset>,
    pub user_name: Option<String>,
    pub user_avatar_url: Option<String>,
    pub vote_count: i64,
}

impl PostWithVotes {
    /// Image URLs as strings.
    #[must_use]
    pub fn image_url_list(&self) -> Vec<String> {
        post::json_string_list(&self.image_urls)
    }
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Returns the number of rows removed.
    pub async fn delete(&self, id: &str) -> AppResult<u64> {
        let result = Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Posts joined with owner fields and aggregated vote counts.
    ///
    /// Grouping by both primary keys lets `PostgreSQL` accept the non-aggregated
    /// post and user columns.
    fn with_votes() -> Select<Post> {
        Post::find()
            .column_as(user::Column::Name, "user_name")
            .column_as(user::Column::AvatarUrl, "user_avatar_url")
            .column_as(
                Expr::col((vote::Entity, vote::Column::Id)).count(),
                "vote_count",
            )
            .join(JoinType::InnerJoin, post::Relation::User.def())
            .join(JoinType::LeftJoin, post::Relation::Votes.def())
            .group_by(post::Column::Id)
            .group_by(user::Column::Id)
    }

    /// A page of posts created in `[since, until)`, newest first.
    pub async fn find_page_in_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        offset: u64,
        limit: u64,
    ) -> AppResult<Vec<PostWithVotes>> {
        Self::with_votes()
            .filter(post::Column::CreatedAt.gte(since))
            .filter(post::Column::CreatedAt.lt(until))
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .offset(offset)
            .limit(limit)
            .into_model::<PostWithVotes>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Posts created in `[since, until)` ranked by vote count.
    ///
    /// Ties go to the earliest post, then the lowest ID, so the ranking is
    /// deterministic.
    pub async fn find_top_in_range(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<PostWithVotes>> {
        Self::with_votes()
            .filter(post::Column::CreatedAt.gte(since))
            .filter(post::Column::CreatedAt.lt(until))
            .order_by_desc(Expr::col((vote::Entity, vote::Column::Id)).count())
            .order_by_asc(post::Column::CreatedAt)
            .order_by_asc(post::Column::Id)
            .limit(limit)
            .into_model::<PostWithVotes>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All posts created inside a day window.
    pub async fn find_in_window(&self, window: &DayWindow) -> AppResult<Vec<post::Model>> {
        Post::find()
            .filter(post::Column::CreatedAt.gte(window.start()))
            .filter(post::Column::CreatedAt.lt(window.end()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count posts created inside a day window.
    pub async fn count_in_window(&self, window: &DayWindow) -> AppResult<u64> {
        Post::find()
            .filter(post::Column::CreatedAt.gte(window.start()))
            .filter(post::Column::CreatedAt.lt(window.end()))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every post created inside a day window.
    pub async fn delete_in_window(&self, window: &DayWindow) -> AppResult<u64> {
        let result = Post::delete_many()
            .filter(post::Column::CreatedAt.gte(window.start()))
            .filter(post::Column::CreatedAt.lt(window.end()))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::{post_row, test_post};
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        match repo.get_by_id("nope").await {
            Err(AppError::PostNotFound(id)) => assert_eq!(id, "nope"),
            _ => panic!("Expected PostNotFound error"),
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let post = test_post("p1", "u1", Utc::now());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post.clone()]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let found = repo.find_by_id("p1").await.unwrap().unwrap();
        assert_eq!(found.image_url_list(), vec!["https://img.example.com/p1.jpg"]);
    }

    #[tokio::test]
    async fn test_find_page_in_range_maps_vote_counts() {
        let now = Utc::now();
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    post_row("p2", "u1", now, 4),
                    post_row("p1", "u2", now - Duration::minutes(5), 0),
                ]])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        let window = DayWindow::containing(now);
        let page = repo
            .find_page_in_range(window.start(), window.end(), 0, 9)
            .await
            .unwrap();

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, "p2");
        assert_eq!(page[0].vote_count, 4);
        assert_eq!(page[0].user_name.as_deref(), Some("Cook u1"));
        assert_eq!(page[1].vote_count, 0);
    }

    #[test]
    fn test_top_query_orders_by_votes_then_earliest() {
        let window = DayWindow::today();
        let sql = PostRepository::with_votes()
            .filter(post::Column::CreatedAt.gte(window.start()))
            .order_by_desc(Expr::col((vote::Entity, vote::Column::Id)).count())
            .order_by_asc(post::Column::CreatedAt)
            .order_by_asc(post::Column::Id)
            .build(DatabaseBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"LEFT JOIN "vote""#));
        assert!(sql.contains(r#"GROUP BY "post"."id", "user"."id""#));
        assert!(sql.contains(
            r#"ORDER BY COUNT("vote"."id") DESC, "post"."created_at" ASC, "post"."id" ASC"#
        ));
    }

    #[tokio::test]
    async fn test_delete_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostRepository::new(db);
        assert_eq!(repo.delete("p1").await.unwrap(), 1);
    }
}
