//! Vote repository.

use std::sync::Arc;

use crate::entities::{Vote, vote};
use iftar_common::{AppError, AppResult, DayWindow};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    sea_query::OnConflict,
};

/// Vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Delete a user's vote on a post. Returns the number of rows removed.
    pub async fn remove(&self, user_id: &str, post_id: &str) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::UserId.eq(user_id))
            .filter(vote::Column::PostId.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Insert a vote unless the `(user_id, post_id)` pair already exists.
    ///
    /// Returns the number of rows inserted, `0` when a concurrent request won.
    pub async fn insert_if_absent(&self, model: vote::ActiveModel) -> AppResult<u64> {
        Vote::insert(model)
            .on_conflict(
                OnConflict::columns([vote::Column::UserId, vote::Column::PostId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every vote on a post.
    pub async fn delete_by_post(&self, post_id: &str) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::PostId.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Count votes on a post.
    pub async fn count_by_post(&self, post_id: &str) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count votes cast inside a day window.
    pub async fn count_in_window(&self, window: &DayWindow) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::CreatedAt.gte(window.start()))
            .filter(vote::Column::CreatedAt.lt(window.end()))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every vote cast inside a day window.
    pub async fn delete_in_window(&self, window: &DayWindow) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::CreatedAt.gte(window.start()))
            .filter(vote::Column::CreatedAt.lt(window.end()))
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
    use chrono::Utc;
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_remove_reports_deleted_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(0)])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        assert_eq!(repo.remove("u1", "p1").await.unwrap(), 1);
        assert_eq!(repo.remove("u1", "p1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_if_absent() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        let model = vote::ActiveModel {
            id: Set("v1".to_string()),
            user_id: Set("u1".to_string()),
            post_id: Set("p1".to_string()),
            created_at: Set(Utc::now().into()),
        };

        assert_eq!(repo.insert_if_absent(model).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_count_by_post() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3)),
                }]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        assert_eq!(repo.count_by_post("p1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_database_error_is_mapped() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_errors([sea_orm::DbErr::Custom("boom".to_string())])
                .into_connection(),
        );

        let repo = VoteRepository::new(db);
        assert!(matches!(
            repo.delete_by_post("p1").await,
            Err(AppError::Database(_))
        ));
    }
}
