use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::extractor::CurrentUser;
use crate::auth::jwt::{Claims, encode_token, ACCESS_TOKEN_MINUTES};
use crate::auth::{password, token};
use crate::error::AppError;
use crate::models::{NewUser, User, ROLE_CUSTOMER};
use crate::routes::ApiJson;
use crate::state::SharedState;
use crate::validation::{normalize_email, ValidationErrors};

const REFRESH_TOKEN_DAYS: i64 = 7;

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn auth_cookies(access_token: &str, refresh_token: &str) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(ACCESS_TOKEN_MINUTES))
        .build();

    let refresh = Cookie::build(("refresh_token", refresh_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(REFRESH_TOKEN_DAYS))
        .build();

    CookieJar::new().add(access).add(refresh)
}

fn clear_auth_cookies() -> CookieJar {
    let access = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let refresh = Cookie::build(("refresh_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access).add(refresh)
}

/// Mint an access token and a fresh refresh token for `user`.
async fn start_session(
    state: &SharedState,
    user: User,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let claims = Claims::new(user.id, user.role.clone());
    let access_token =
        encode_token(&claims, &state.config.jwt_secret).map_err(AppError::Internal)?;

    let refresh = token::generate();
    state
        .stores
        .refresh_tokens
        .create(
            user.id,
            &token::hash(&refresh),
            Utc::now() + Duration::days(REFRESH_TOKEN_DAYS),
        )
        .await?;

    let jar = auth_cookies(&access_token, &refresh);
    Ok((
        jar,
        Json(AuthResponse {
            access_token,
            refresh_token: refresh,
            token_type: "Bearer",
            user,
        }),
    ))
}

pub async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>), AppError> {
    let mut errors = ValidationErrors::new();
    if errors.required("name", &req.name) {
        errors.max_len("name", &req.name, 255);
    }
    errors.email("email", &req.email);
    errors.password("password", &req.password, Some(&req.password_confirmation));
    errors.into_result()?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    // The first account bootstraps the admin role.
    let user = state
        .stores
        .users
        .create_bootstrapping(NewUser {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            password_hash: pw_hash,
            role: ROLE_CUSTOMER.to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");
    state.verifier.send_link(&user);

    let (jar, body) = start_session(&state, user).await?;
    Ok((StatusCode::CREATED, jar, body))
}

pub async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let mut errors = ValidationErrors::new();
    errors.required("email", &req.email);
    errors.required("password", &req.password);
    errors.into_result()?;

    let user = state
        .gate
        .attempt(&req.email, &req.password)
        .await
        .inspect_err(|e| {
            if matches!(e, AppError::InvalidCredentials) {
                state.metrics.record_sign_in_failure();
            }
        })?;
    tracing::info!(user_id = %user.id, "User signed in");

    start_session(&state, user).await
}

pub async fn refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>), AppError> {
    let refresh_value = jar
        .get("refresh_token")
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let refresh_tokens = &state.stores.refresh_tokens;
    let stored = refresh_tokens
        .find_by_hash(&token::hash(&refresh_value))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if stored.used || !refresh_tokens.mark_used(stored.id).await? {
        tracing::warn!(
            "Refresh token reuse detected for user {}. Revoking all sessions.",
            stored.user_id
        );
        refresh_tokens.delete_all_for_user(stored.user_id).await?;
        return Err(AppError::Unauthorized(
            "Refresh token reuse detected. All sessions revoked.".to_string(),
        ));
    }

    if stored.expires_at < Utc::now() {
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    let user = state
        .stores
        .users
        .find_by_id(stored.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    start_session(&state, user).await
}

pub async fn logout(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    if let Some(cookie) = jar.get("refresh_token") {
        state
            .stores
            .refresh_tokens
            .delete_by_hash(&token::hash(cookie.value()))
            .await?;
    }

    Ok((
        clear_auth_cookies(),
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
