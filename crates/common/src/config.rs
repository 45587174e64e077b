//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Image storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Identity provider configuration.
    pub auth: AuthConfig,
    /// Competition rules.
    #[serde(default)]
    pub competition: CompetitionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection attempts before giving up at startup.
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    /// Delay between connection attempts, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Image storage backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage, served by this process.
    Local {
        /// Base path for stored files.
        base_path: PathBuf,
        /// Base URL for serving files.
        base_url: String,
    },
    /// Cloudinary image hosting.
    Cloudinary {
        /// Cloud name.
        cloud_name: String,
        /// API key.
        api_key: String,
        /// API secret (used to sign requests).
        api_secret: String,
        /// Folder that uploads are placed in.
        #[serde(default = "default_cloudinary_folder")]
        folder: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            base_path: PathBuf::from("./files"),
            base_url: "/files".to_string(),
        }
    }
}

impl StorageConfig {
    /// Short name of the backend, for logs and health output.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Cloudinary { .. } => "cloudinary",
        }
    }
}

/// Identity provider (Google OAuth) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// OAuth client ID.
    #[serde(default)]
    pub google_client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub google_client_secret: String,
    /// Redirect URL registered with the provider. Defaults to
    /// `{server.url}/api/auth/callback`.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Emails granted the admin flag on sign-in.
    #[serde(default)]
    pub admin_emails: Vec<String>,
    /// Whether session cookies carry the `Secure` attribute.
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
}

impl AuthConfig {
    /// Whether the provider credentials are present.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.google_client_id.is_empty() && !self.google_client_secret.is_empty()
    }

    /// Whether an email belongs to a configured admin.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Competition rules.
#[derive(Debug, Clone, Deserialize)]
pub struct CompetitionConfig {
    /// Per-image upload ceiling in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Default page size of the feed.
    #[serde(default = "default_feed_page_size")]
    pub feed_page_size: u64,
    /// UTC hour at which the daily winner is announced.
    #[serde(default = "default_announcement_hour")]
    pub announcement_hour_utc: u32,
    /// Look-back window of the trending view, in hours.
    #[serde(default = "default_trending_hours")]
    pub trending_hours: i64,
    /// Default number of posts in the trending view.
    #[serde(default = "default_trending_limit")]
    pub trending_limit: u64,
    /// Number of past days shown in the winner history.
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            feed_page_size: default_feed_page_size(),
            announcement_hour_utc: default_announcement_hour(),
            trending_hours: default_trending_hours(),
            trending_limit: default_trending_limit(),
            history_days: default_history_days(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_connect_retries() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_cloudinary_folder() -> String {
    "iftar".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_max_image_bytes() -> usize {
    10 * 1024 * 1024
}

const fn default_feed_page_size() -> u64 {
    9
}

const fn default_announcement_hour() -> u32 {
    22
}

const fn default_trending_hours() -> i64 {
    24
}

const fn default_trending_limit() -> u64 {
    10
}

const fn default_history_days() -> u32 {
    7
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `IFTAR_ENV`)
    /// 4. Environment variables with `IFTAR__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("IFTAR_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("IFTAR")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.admin_emails")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("IFTAR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// OAuth redirect URL, derived from the public URL when not set.
    #[must_use]
    pub fn auth_redirect_url(&self) -> String {
        self.auth.redirect_url.clone().unwrap_or_else(|| {
            format!(
                "{}/api/auth/callback",
                self.server.url.trim_end_matches('/')
            )
        })
    }
}
