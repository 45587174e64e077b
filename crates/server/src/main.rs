//! Iftar photo competition server entry point.

use std::sync::Arc;

use axum::{Router, middleware};
use iftar_api::{middleware::AppState, router as api_router};
use iftar_common::{Config, config::StorageConfig};
use iftar_core::{
    AccountService, CloudinaryConfig, CloudinaryStorage, GoogleCredentials,
    GoogleIdentityProvider, LocalStorage, PostService, StatsService, StorageService, VoteService,
    WinnerService,
};
use iftar_db::repositories::{PostRepository, UserRepository, VoteRepository};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Build the image storage backend selected in the configuration.
fn build_storage(config: &StorageConfig) -> StorageService {
    match config {
        StorageConfig::Local {
            base_path,
            base_url,
        } => Arc::new(LocalStorage::new(base_path.clone(), base_url.clone())),
        StorageConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
            folder,
        } => Arc::new(CloudinaryStorage::new(CloudinaryConfig {
            cloud_name: cloud_name.clone(),
            api_key: api_key.clone(),
            api_secret: api_secret.clone(),
            folder: folder.clone(),
        })),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iftar=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting iftar server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = iftar_db::init(&config).await?;

    // Run migrations
    info!("Running database migrations...");
    iftar_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let post_repo = PostRepository::new(Arc::clone(&db));
    let vote_repo = VoteRepository::new(Arc::clone(&db));

    // Initialize storage and identity
    let storage = build_storage(&config.storage);
    info!(backend = storage.name(), "Configured image storage");

    let google = GoogleIdentityProvider::new(GoogleCredentials {
        client_id: config.auth.google_client_id.clone(),
        client_secret: config.auth.google_client_secret.clone(),
        redirect_url: config.auth_redirect_url(),
    });
    if !config.auth.is_configured() {
        warn!("Google sign-in is not configured; sign-in will be unavailable");
    }

    // Initialize services
    let account_service = AccountService::new(
        user_repo.clone(),
        Arc::new(google),
        config.auth.admin_emails.clone(),
    );
    let post_service = PostService::new(
        post_repo.clone(),
        vote_repo.clone(),
        storage.clone(),
        config.competition.max_image_bytes,
    );
    let vote_service = VoteService::new(vote_repo.clone(), post_repo.clone());
    let winner_service =
        WinnerService::new(post_repo.clone(), config.competition.announcement_hour_utc);
    let stats_service = StatsService::new(post_repo, vote_repo, user_repo, storage.clone());

    let config = Arc::new(config);

    // Create app state
    let state = AppState {
        account_service,
        post_service,
        vote_service,
        winner_service,
        stats_service,
        db: Arc::clone(&db),
        storage_backend: config.storage.backend_name(),
        config: Arc::clone(&config),
    };

    // Build router
    let mut app = Router::new().nest("/api", api_router());

    if let StorageConfig::Local { base_path, .. } = &config.storage {
        app = app.nest_service("/files", ServeDir::new(base_path));
    }

    let app = app
        .layer(middleware::from_fn_with_state(
            state.clone(),
            iftar_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match Arc::try_unwrap(db) {
        Ok(db) => iftar_db::close(db).await?,
        Err(_) => warn!("Database connection still shared at shutdown"),
    }
    info!("Server shutdown complete");
    Ok(())
}
