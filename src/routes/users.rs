use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::VerifiedUser;
use crate::auth::password;
use crate::error::AppError;
use crate::models::{NewUser, User, UserProfile, ROLE_ADMIN, ROLE_CUSTOMER};
use crate::routes::ApiJson;
use crate::state::SharedState;
use crate::validation::{normalize_email, ValidationErrors};

const DEFAULT_LIMIT: i64 = 15;
const MAX_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub struct Pagination {
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct UserPage {
    pub data: Vec<User>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

fn parse_id(id: &str) -> Result<Uuid, AppError> {
    id.parse()
        .map_err(|_| AppError::NotFound("User not found".to_string()))
}

fn unauthorized_action() -> AppError {
    AppError::Forbidden("This action is unauthorized.".to_string())
}

pub async fn index(
    State(state): State<SharedState>,
    _auth: VerifiedUser,
    Query(page): Query<Pagination>,
) -> Result<Json<UserPage>, AppError> {
    let offset = page.offset.unwrap_or(0).max(0);
    let limit = page.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let data = state.stores.users.list(limit, offset).await?;
    let total = state.stores.users.count().await?;

    Ok(Json(UserPage {
        data,
        total,
        offset,
        limit,
    }))
}

pub async fn store(
    State(state): State<SharedState>,
    VerifiedUser(actor): VerifiedUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if !actor.is_admin() {
        return Err(unauthorized_action());
    }

    let mut errors = ValidationErrors::new();
    if errors.required("name", &req.name) {
        errors.max_len("name", &req.name, 255);
    }
    errors.email("email", &req.email);
    errors.password("password", &req.password, None);
    let role = req.role.as_deref().unwrap_or(ROLE_CUSTOMER);
    if role != ROLE_ADMIN && role != ROLE_CUSTOMER {
        errors.add("role", "The selected role is invalid.");
    }
    errors.into_result()?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;
    let user = state
        .stores
        .users
        .create(NewUser {
            name: req.name.trim().to_string(),
            email: normalize_email(&req.email),
            password_hash: pw_hash,
            role: role.to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, created_by = %actor.id, "User created");
    state.verifier.send_link(&user);

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn show(
    State(state): State<SharedState>,
    _auth: VerifiedUser,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let user = state
        .stores
        .users
        .find_by_id(parse_id(&id)?)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

pub async fn update(
    State(state): State<SharedState>,
    VerifiedUser(actor): VerifiedUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(&id)?;
    let target = state
        .stores
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if actor.id != target.id && !actor.is_admin() {
        return Err(unauthorized_action());
    }

    let mut errors = ValidationErrors::new();
    if let Some(name) = &req.name {
        if errors.required("name", name) {
            errors.max_len("name", name, 255);
        }
    }
    if let Some(email) = &req.email {
        errors.email("email", email);
    }
    errors.into_result()?;

    let profile = UserProfile {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.as_deref().map(normalize_email),
    };
    let updated = state
        .stores
        .users
        .update_profile(id, profile)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if updated.email != target.email {
        // A pending reset link must not follow the old address to its next owner.
        state.stores.reset_tokens.delete(&target.email).await?;
        tracing::info!(user_id = %updated.id, "Email changed, verification reset");
        state.verifier.send_link(&updated);
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn destroy(
    State(state): State<SharedState>,
    VerifiedUser(actor): VerifiedUser,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !actor.is_admin() {
        return Err(unauthorized_action());
    }

    let id = parse_id(&id)?;
    let user = state
        .stores
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !state.stores.users.delete(id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    state.stores.reset_tokens.delete(&user.email).await?;
    state.stores.refresh_tokens.delete_all_for_user(id).await?;

    tracing::info!(user_id = %id, deleted_by = %actor.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}
