use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::broker::ResetLinkStatus;
use crate::error::AppError;
use crate::routes::ApiJson;
use crate::state::SharedState;
use crate::validation::ValidationErrors;

pub const RESET_LINK_SENT: &str = "We have emailed your password reset link!";
pub const PASSWORD_RESET: &str = "Your password has been reset!";

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
}

pub async fn forgot_password(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let mut errors = ValidationErrors::new();
    errors.email("email", &req.email);
    errors.into_result()?;

    // Same answer either way so the response does not reveal registered emails.
    match state.broker.send_reset_link(&req.email).await? {
        ResetLinkStatus::Sent | ResetLinkStatus::UserNotFound => Ok(Json(StatusResponse {
            status: RESET_LINK_SENT.to_string(),
        })),
    }
}

pub async fn reset_password(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let mut errors = ValidationErrors::new();
    errors.required("token", &req.token);
    errors.email("email", &req.email);
    errors.password("password", &req.password, Some(&req.password_confirmation));
    errors.into_result()?;

    state
        .broker
        .reset(&req.email, &req.token, &req.password)
        .await?;
    state.metrics.record_password_reset();

    Ok(Json(StatusResponse {
        status: PASSWORD_RESET.to_string(),
    }))
}
