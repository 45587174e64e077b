//! Account service: sign-in, sessions and sign-out.

use std::sync::Arc;

use crate::services::identity::{ExternalIdentity, IdentityProvider};
use chrono::Utc;
use iftar_common::{AppError, AppResult, IdGenerator};
use iftar_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use tracing::info;

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    user_repo: UserRepository,
    identity: Arc<dyn IdentityProvider>,
    admin_emails: Vec<String>,
    id_gen: IdGenerator,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        identity: Arc<dyn IdentityProvider>,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            user_repo,
            identity,
            admin_emails,
            id_gen: IdGenerator::new(),
        }
    }

    /// Whether sign-in is possible at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.identity.is_configured()
    }

    /// Start a sign-in: returns a fresh CSRF state and the provider URL.
    pub fn begin_sign_in(&self) -> AppResult<(String, String)> {
        let state = self.id_gen.generate_state();
        let url = self.identity.authorize_url(&state)?;
        Ok((state, url))
    }

    /// Finish a sign-in with the provider's authorization code.
    pub async fn complete_sign_in(&self, code: &str) -> AppResult<user::Model> {
        let identity = self.identity.exchange_code(code).await?;
        self.upsert_identity(identity).await
    }

    /// Create or refresh the account for an identity.
    ///
    /// An existing session token is kept so other signed-in devices stay
    /// signed in.
    pub async fn upsert_identity(&self, identity: ExternalIdentity) -> AppResult<user::Model> {
        let is_admin = self.is_admin_email(&identity.email);

        if let Some(existing) = self.user_repo.find_by_email(&identity.email).await? {
            let token = existing
                .token
                .clone()
                .unwrap_or_else(|| self.id_gen.generate_session_token());

            let mut active: user::ActiveModel = existing.into();
            active.name = Set(identity.name);
            active.avatar_url = Set(identity.avatar_url);
            active.token = Set(Some(token));
            active.is_admin = Set(is_admin);
            active.updated_at = Set(Some(Utc::now().into()));

            let updated = self.user_repo.update(active).await?;
            info!(user_id = %updated.id, "User signed in");
            return Ok(updated);
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            email: Set(identity.email),
            name: Set(identity.name),
            avatar_url: Set(identity.avatar_url),
            token: Set(Some(self.id_gen.generate_session_token())),
            is_admin: Set(is_admin),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let created = self.user_repo.create(model).await?;
        info!(user_id = %created.id, "User registered");
        Ok(created)
    }

    /// Resolve a session token to its user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        if token.is_empty() {
            return Err(AppError::Unauthorized);
        }

        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Sign out everywhere by rotating the session token.
    pub async fn sign_out(&self, user_id: &str) -> AppResult<()> {
        let user = self.user_repo.get_by_id(user_id).await?;

        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(self.id_gen.generate_session_token()));
        active.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(active).await?;

        info!(user_id = %user_id, "User signed out");
        Ok(())
    }

    fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}
