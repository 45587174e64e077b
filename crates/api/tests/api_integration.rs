//! API integration tests.
//!
//! These tests drive the router end to end against a mock database.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    middleware::from_fn_with_state,
};
use chrono::Utc;
use iftar_api::{
    middleware::{AppState, auth_middleware},
    router as api_router,
};
use iftar_common::{
    AppError, AppResult,
    config::{
        AuthConfig, CompetitionConfig, Config, DatabaseConfig, ServerConfig, StorageConfig,
    },
};
use iftar_core::{
    AccountService, ExternalIdentity, IdentityProvider, NoOpStorage, PostService, StatsService,
    StorageService, VoteService, WinnerService,
};
use iftar_db::{
    entities::post,
    repositories::{PostRepository, UserRepository, VoteRepository},
    test_utils::{post_row, test_post, test_user},
};
use maplit::btreemap;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
use serde_json::Value as Json;
use tower::ServiceExt;

/// Identity provider that never talks to the network.
struct StubIdentity;

#[async_trait]
impl IdentityProvider for StubIdentity {
    fn authorize_url(&self, state: &str) -> AppResult<String> {
        Ok(format!("https://accounts.example.com/auth?state={state}"))
    }

    async fn exchange_code(&self, _code: &str) -> AppResult<ExternalIdentity> {
        Err(AppError::Unauthorized)
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn create_test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            url: "http://localhost:3000".to_string(),
        },
        database: DatabaseConfig {
            url: "postgres://localhost/test".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_retries: 1,
            retry_delay_ms: 0,
        },
        storage: StorageConfig::default(),
        auth: AuthConfig {
            google_client_id: "client".to_string(),
            google_client_secret: "secret".to_string(),
            redirect_url: None,
            admin_emails: vec!["admin@example.com".to_string()],
            secure_cookies: false,
        },
        competition: CompetitionConfig {
            max_image_bytes: 1024 * 1024,
            feed_page_size: 9,
            announcement_hour_utc: 22,
            trending_hours: 24,
            trending_limit: 10,
            history_days: 7,
        },
    }
}

fn create_test_state(db: DatabaseConnection) -> AppState {
    let db = Arc::new(db);
    let config = create_test_config();

    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));
    let storage: StorageService = Arc::new(NoOpStorage::new("http://localhost:3000/files".to_string()));

    AppState {
        account_service: AccountService::new(
            user_repo.clone(),
            Arc::new(StubIdentity),
            config.auth.admin_emails.clone(),
        ),
        post_service: PostService::new(
            post_repo.clone(),
            vote_repo.clone(),
            storage.clone(),
            config.competition.max_image_bytes,
        ),
        vote_service: VoteService::new(vote_repo.clone(), post_repo.clone()),
        winner_service: WinnerService::new(
            post_repo.clone(),
            config.competition.announcement_hour_utc,
        ),
        stats_service: StatsService::new(post_repo, vote_repo, user_repo, storage),
        db,
        storage_backend: config.storage.backend_name(),
        config: Arc::new(config),
    }
}

fn create_app(db: DatabaseConnection) -> Router {
    let state = create_test_state(db);
    api_router()
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
    btreemap! { "num_items" => Value::BigInt(Some(n)) }
}

async fn json_body(response: axum::response::Response) -> Json {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_session_without_cookie_is_null() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["data"]["user"].is_null());
}

#[tokio::test]
async fn test_session_with_bearer_token() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("u1", "admin@example.com")]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/session")
                .header(header::AUTHORIZATION, "Bearer token-u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["user"]["id"], "u1");
    assert_eq!(body["data"]["user"]["email"], "admin@example.com");
}

#[tokio::test]
async fn test_signin_redirects_with_state_cookie() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/signin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://accounts.example.com/auth?state="));
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("iftar_oauth_state="));
}

#[tokio::test]
async fn test_callback_with_mismatched_state() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/callback?code=abc&state=forged")
                .header(header::COOKIE, "iftar_oauth_state=expected")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.ends_with("error=OAuthCallback"));
}

#[tokio::test]
async fn test_auth_error_page() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/error?error=AccessDenied")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let body = json_body(response).await;
    assert_eq!(body["error"], "Access denied");
    assert_eq!(body["code"], "AccessDenied");
}

#[tokio::test]
async fn test_vote_requires_session() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/posts/p1/vote")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_post_requires_session() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/posts")
                .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
                .body(Body::from("--x--\r\n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_vote_toggle_adds_vote() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("u2", "guest@example.com")]])
        .append_query_results([[test_post("p1", "u1", Utc::now())]])
        .append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ])
        .append_query_results([[count_row(1)]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/posts/p1/vote")
                .header(header::AUTHORIZATION, "Bearer token-u2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["action"], "added");
    assert_eq!(body["data"]["postId"], "p1");
    assert_eq!(body["data"]["voteCount"], 1);
}

#[tokio::test]
async fn test_delete_without_id() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("u1", "cook@example.com")]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/posts")
                .header(header::AUTHORIZATION, "Bearer token-u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_lists_todays_posts() {
    let now = Utc::now();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[post_row("p2", "u1", now, 3), post_row("p1", "u2", now, 0)]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/posts?page=1&limit=9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], "p2");
    assert_eq!(items[0]["voteCount"], 3);
    assert_eq!(items[0]["user"]["name"], "Cook u1");
    assert_eq!(body["data"]["hasMore"], false);
}

#[tokio::test]
async fn test_feed_rejects_oversized_limit() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/posts?limit=500")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_feed_rejects_out_of_range_page() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/posts?page=18446744073709551615&limit=50")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_daily_winner_without_posts() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<post::Model>::new()])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/winners/daily")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["data"]["winner"].is_null());
    assert!(body["data"]["announcementAt"].is_string());
}

#[tokio::test]
async fn test_trending_rejects_out_of_range_hours() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/posts/trending?hours=1000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_counts() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[count_row(4)], [count_row(11)], [count_row(7)]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["posts"], 4);
    assert_eq!(body["data"]["votes"], 11);
    assert_eq!(body["data"]["users"], 7);
}

#[tokio::test]
async fn test_reset_forbidden_for_non_admin() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_user("u1", "cook@example.com")]])
        .into_connection();
    let app = create_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/stats/reset")
                .header(header::AUTHORIZATION, "Bearer token-u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_reports_integrations() {
    let app = create_app(empty_db());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert_eq!(body["integrations"]["storage"], "local");
    assert_eq!(body["integrations"]["cloudinary"], false);
    assert_eq!(body["integrations"]["googleAuth"], true);
}
