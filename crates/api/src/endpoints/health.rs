//! Health check endpoint.

use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use iftar_common::config::StorageConfig;
use serde::Serialize;
use tracing::error;

use crate::middleware::AppState;

/// Database probe result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseHealth {
    pub connected: bool,
    pub response_time_ms: u128,
    pub error: Option<String>,
}

/// Which integrations are configured.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationFlags {
    pub storage: &'static str,
    pub cloudinary: bool,
    pub google_auth: bool,
}

/// Health report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub database: DatabaseHealth,
    pub integrations: IntegrationFlags,
    pub timestamp: String,
    pub response_time_ms: u128,
}

/// Ping the database and report configuration.
async fn health(State(state): State<AppState>) -> Response {
    let started = Instant::now();

    let db_started = Instant::now();
    let ping = state.db.ping().await;
    let database = DatabaseHealth {
        connected: ping.is_ok(),
        response_time_ms: db_started.elapsed().as_millis(),
        error: ping.err().map(|e| {
            error!(error = %e, "Health check database ping failed");
            e.to_string()
        }),
    };

    let healthy = database.connected;
    let report = HealthReport {
        status: if healthy { "healthy" } else { "unhealthy" },
        database,
        integrations: IntegrationFlags {
            storage: state.storage_backend,
            cloudinary: matches!(state.config.storage, StorageConfig::Cloudinary { .. }),
            google_auth: state.account_service.is_configured(),
        },
        timestamp: Utc::now().to_rfc3339(),
        response_time_ms: started.elapsed().as_millis(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}
