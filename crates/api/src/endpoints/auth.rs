//! Authentication endpoints.
//!
//! Sign-in goes through Google's authorization-code flow. A successful
//! callback stores the account's session token in an HTTP-only cookie; API
//! clients may send the same token as a bearer token instead.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use iftar_common::{AppError, AppResult};
use iftar_db::entities::user;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::{AppState, SESSION_COOKIE},
    response::ApiResponse,
};

const STATE_COOKIE: &str = "iftar_oauth_state";
const SESSION_MAX_AGE_DAYS: i64 = 30;
const STATE_MAX_AGE_MINUTES: i64 = 10;

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_MAX_AGE_DAYS))
        .build()
}

fn state_cookie(state: String, secure: bool) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, state))
        .path("/api/auth")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(STATE_MAX_AGE_MINUTES))
        .build()
}

fn error_redirect(code: &str) -> Redirect {
    Redirect::to(&format!("/api/auth/error?error={code}"))
}

/// Redirect the browser to the identity provider.
async fn signin(State(state): State<AppState>, jar: CookieJar) -> Response {
    match state.account_service.begin_sign_in() {
        Ok((csrf_state, url)) => {
            let secure = state.config.auth.secure_cookies;
            let jar = jar.add(state_cookie(csrf_state, secure));
            (jar, Redirect::to(&url)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Sign-in is not available");
            error_redirect("Configuration").into_response()
        }
    }
}

/// Provider callback parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Complete sign-in and set the session cookie.
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path("/api/auth"));

    if let Some(error) = query.error {
        info!(error = %error, "Provider returned an error");
        let code = if error == "access_denied" {
            "AccessDenied"
        } else {
            "OAuthCallback"
        };
        return (jar, error_redirect(code)).into_response();
    }

    let (Some(code), Some(returned_state)) = (query.code, query.state) else {
        return (jar, error_redirect("OAuthCallback")).into_response();
    };

    if expected_state.as_deref() != Some(returned_state.as_str()) {
        warn!("OAuth state mismatch");
        return (jar, error_redirect("OAuthCallback")).into_response();
    }

    match state.account_service.complete_sign_in(&code).await {
        Ok(user) => {
            let Some(token) = user.token else {
                return (jar, error_redirect("Callback")).into_response();
            };
            let secure = state.config.auth.secure_cookies;
            let jar = jar.add(session_cookie(token, secure));
            (jar, Redirect::to("/")).into_response()
        }
        Err(AppError::Config(e)) => {
            warn!(error = %e, "Sign-in is not configured");
            (jar, error_redirect("Configuration")).into_response()
        }
        Err(AppError::Unauthorized) => (jar, error_redirect("AccessDenied")).into_response(),
        Err(e) => {
            warn!(error = %e, "Sign-in callback failed");
            (jar, error_redirect("Callback")).into_response()
        }
    }
}

/// Signed-in user as exposed to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

impl From<user::Model> for SessionUser {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            avatar_url: u.avatar_url,
            is_admin: u.is_admin,
        }
    }
}

/// Session response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<SessionUser>,
}

/// Current session, or `{"user": null}`.
async fn session(MaybeAuthUser(user): MaybeAuthUser) -> ApiResponse<SessionResponse> {
    ApiResponse::ok(SessionResponse {
        user: user.map(SessionUser::from),
    })
}

/// Sign-out response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignoutResponse {
    pub signed_out: bool,
}

/// Sign out: rotate the session token and clear the cookie.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, ApiResponse<SignoutResponse>)> {
    state.account_service.sign_out(&user.id).await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, ApiResponse::ok(SignoutResponse { signed_out: true })))
}

/// Auth error query.
#[derive(Debug, Deserialize)]
pub struct ErrorQuery {
    pub error: Option<String>,
}

/// Auth error body.
#[derive(Debug, Serialize)]
pub struct AuthErrorBody {
    pub error: &'static str,
    pub code: String,
    pub timestamp: String,
}

/// Status and message for a sign-in error code.
fn describe_auth_error(code: Option<&str>) -> (StatusCode, &'static str) {
    match code {
        Some("Configuration") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Server configuration error",
        ),
        Some("AccessDenied") => (StatusCode::FORBIDDEN, "Access denied"),
        Some("Verification") => (
            StatusCode::BAD_REQUEST,
            "Verification link invalid or expired",
        ),
        Some(
            "OAuthSignin" | "OAuthCallback" | "OAuthCreateAccount" | "EmailCreateAccount"
            | "Callback",
        ) => (StatusCode::BAD_REQUEST, "Error during authentication"),
        Some("CredentialsSignin") => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
        Some("SessionRequired") => (
            StatusCode::UNAUTHORIZED,
            "Please sign in to access this page",
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "An authentication error occurred",
        ),
    }
}

/// Render a sign-in error.
async fn auth_error(Query(query): Query<ErrorQuery>) -> Response {
    let (status, message) = describe_auth_error(query.error.as_deref());
    warn!(error = ?query.error, status = %status, "Authentication error");

    let body = AuthErrorBody {
        error: message,
        code: query.error.unwrap_or_else(|| "UNKNOWN_ERROR".to_string()),
        timestamp: Utc::now().to_rfc3339(),
    };

    (status, [(header::CACHE_CONTROL, "no-store")], Json(body)).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signin", get(signin))
        .route("/callback", get(callback))
        .route("/session", get(session))
        .route("/signout", post(signout))
        .route("/error", get(auth_error))
}
