//! External identity providers.
//!
//! Sign-in is delegated to Google using the OAuth 2.0 authorization-code flow.
//! The provider only answers "who is this"; accounts and sessions live in
//! [`AccountService`](super::account::AccountService).

use async_trait::async_trait;
use iftar_common::{AppError, AppResult};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Profile returned by an identity provider after a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// Verified email address; accounts are keyed on it.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// An OAuth identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL to send the browser to, carrying the CSRF `state`.
    fn authorize_url(&self, state: &str) -> AppResult<String>;

    /// Exchange an authorization code for the signed-in identity.
    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity>;

    /// Whether credentials are configured.
    fn is_configured(&self) -> bool;
}

/// Google OAuth credentials.
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    /// OAuth client ID.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Callback URL registered with Google.
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<bool>,
    name: Option<String>,
    picture: Option<String>,
}

/// Google identity provider.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    credentials: GoogleCredentials,
    http_client: reqwest::Client,
}

impl GoogleIdentityProvider {
    /// Create a new Google provider.
    #[must_use]
    pub fn new(credentials: GoogleCredentials) -> Self {
        Self {
            credentials,
            http_client: reqwest::Client::new(),
        }
    }

    fn ensure_configured(&self) -> AppResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AppError::Config(
                "Google sign-in is not configured".to_string(),
            ))
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorize_url(&self, state: &str) -> AppResult<String> {
        self.ensure_configured()?;

        let url = Url::parse_with_params(
            GOOGLE_AUTHORIZE_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", self.credentials.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AppError::Config(format!("Invalid authorize URL: {e}")))?;

        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity> {
        self.ensure_configured()?;

        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("redirect_uri", self.credentials.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Token exchange failed: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Authorization code rejected");
            return Err(AppError::Unauthorized);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Invalid token response: {e}")))?;

        let info: UserInfo = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Userinfo request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::UpstreamService(format!("Userinfo request failed: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::UpstreamService(format!("Invalid userinfo response: {e}")))?;

        let identity = identity_from_userinfo(info)?;
        debug!(email = %identity.email, "Resolved Google identity");
        Ok(identity)
    }

    fn is_configured(&self) -> bool {
        !self.credentials.client_id.is_empty() && !self.credentials.client_secret.is_empty()
    }
}

/// Accept a userinfo payload only when it carries a verified email.
fn identity_from_userinfo(info: UserInfo) -> AppResult<ExternalIdentity> {
    let email = info
        .email
        .filter(|e| !e.is_empty())
        .ok_or(AppError::Unauthorized)?;

    if info.email_verified == Some(false) {
        return Err(AppError::Unauthorized);
    }

    Ok(ExternalIdentity {
        email: email.to_lowercase(),
        name: info.name,
        avatar_url: info.picture,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn provider(client_id: &str) -> GoogleIdentityProvider {
        GoogleIdentityProvider::new(GoogleCredentials {
            client_id: client_id.to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://localhost:3000/api/auth/callback".to_string(),
        })
    }

    #[test]
    fn test_authorize_url_params() {
        let url = provider("client-1").authorize_url("state-xyz").unwrap();
        let parsed = Url::parse(&url).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(parsed.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["state"], "state-xyz");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:3000/api/auth/callback"
        );
    }

    #[test]
    fn test_unconfigured_provider() {
        let google = provider("");
        assert!(!google.is_configured());
        assert!(matches!(
            google.authorize_url("s"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_identity_from_userinfo() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "email": "Cook@Example.com",
            "email_verified": true,
            "name": "Cook",
            "picture": "https://example.com/a.png"
        }))
        .unwrap();

        let identity = identity_from_userinfo(info).unwrap();
        assert_eq!(identity.email, "cook@example.com");
        assert_eq!(identity.avatar_url.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    fn test_identity_requires_verified_email() {
        let unverified: UserInfo = serde_json::from_value(serde_json::json!({
            "email": "cook@example.com",
            "email_verified": false
        }))
        .unwrap();
        assert!(matches!(
            identity_from_userinfo(unverified),
            Err(AppError::Unauthorized)
        ));

        let missing: UserInfo = serde_json::from_value(serde_json::json!({ "name": "x" })).unwrap();
        assert!(identity_from_userinfo(missing).is_err());
    }
}
