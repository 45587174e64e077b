//! Test utilities for database operations.
//!
//! Fixture builders for mock-backed tests plus a [`TestDatabase`] helper for
//! running against a live `PostgreSQL` instance.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement, Value,
};
use tracing::info;

use crate::entities::{post, user, vote};

/// Build a user fixture.
#[must_use]
pub fn test_user(id: &str, email: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        email: email.to_string(),
        name: Some(format!("Cook {id}")),
        avatar_url: None,
        token: Some(format!("token-{id}")),
        is_admin: false,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

/// Build a post fixture with a single image.
#[must_use]
pub fn test_post(id: &str, user_id: &str, created_at: DateTime<Utc>) -> post::Model {
    post::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: Some("Iftar Photos".to_string()),
        description: None,
        image_urls: serde_json::json!([format!("https://img.example.com/{id}.jpg")]),
        image_keys: serde_json::json!([format!("iftar/{id}")]),
        created_at: created_at.into(),
    }
}

/// Build a vote fixture.
#[must_use]
pub fn test_vote(id: &str, user_id: &str, post_id: &str) -> vote::Model {
    vote::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        post_id: post_id.to_string(),
        created_at: Utc::now().into(),
    }
}

/// Build a mock row shaped like
/// [`PostWithVotes`](crate::repositories::PostWithVotes).
#[must_use]
pub fn post_row(
    id: &str,
    user_id: &str,
    created_at: DateTime<Utc>,
    vote_count: i64,
) -> BTreeMap<&'static str, Value> {
    let created_at: DateTime<FixedOffset> = created_at.into();
    BTreeMap::from([
        ("id", id.into()),
        ("user_id", user_id.into()),
        ("title", Some("Iftar Photos".to_string()).into()),
        ("description", Option::<String>::None.into()),
        (
            "image_urls",
            serde_json::json!([format!("https://img.example.com/{id}.jpg")]).into(),
        ),
        ("image_keys", serde_json::json!([format!("iftar/{id}")]).into()),
        ("created_at", created_at.into()),
        ("user_name", Some(format!("Cook {user_id}")).into()),
        ("user_avatar_url", Option::<String>::None.into()),
        ("vote_count", vote_count.into()),
    ])
}

/// Test database configuration.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("TEST_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: std::env::var("TEST_DB_USER").unwrap_or_else(|_| "iftar_test".to_string()),
            password: std::env::var("TEST_DB_PASSWORD")
                .unwrap_or_else(|_| "iftar_test".to_string()),
            database: std::env::var("TEST_DB_NAME").unwrap_or_else(|_| "iftar_test".to_string()),
        }
    }
}

impl TestDbConfig {
    /// Get the database URL.
    #[must_use]
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }
}

/// A connection to a live test database.
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
    /// Database configuration.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect using the `TEST_DB_*` environment and run migrations.
    pub async fn new() -> Result<Self, DbErr> {
        let config = TestDbConfig::default();
        let conn = Database::connect(&config.database_url()).await?;

        {
            use sea_orm_migration::MigratorTrait;
            crate::migrations::Migrator::up(&conn, None).await?;
        }

        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Remove all competition data, keeping the schema.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                r#"TRUNCATE TABLE "vote", "post", "user" CASCADE"#.to_string(),
            ))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }
}
