//! Database layer for the Iftar photo competition.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use iftar_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;
use tracing::{info, warn};

/// Initialize the database connection pool.
///
/// Connection failures are retried `database.connect_retries` times with a
/// fixed delay before the error is returned.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let mut opt = ConnectOptions::new(&config.database.url);

    opt.max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    let attempts = config.database.connect_retries.max(1);
    let delay = Duration::from_millis(config.database.retry_delay_ms);
    let mut attempt = 1;

    loop {
        match Database::connect(opt.clone()).await {
            Ok(db) => {
                info!(attempt, "Database connection established");
                return Ok(db);
            }
            Err(e) if attempt < attempts => {
                warn!(attempt, attempts, error = %e, "Database connection failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        }
    }
}

/// Close the connection pool.
pub async fn close(db: DatabaseConnection) -> Result<(), AppError> {
    db.close()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
