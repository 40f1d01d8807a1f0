use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::extractor::CurrentUser;
use crate::auth::verification::{ResendOutcome, VerifyOutcome, INVALID_SIGNATURE};
use crate::error::AppError;
use crate::routes::auth::MessageResponse;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SignedQuery {
    pub expires: Option<String>,
    pub signature: Option<String>,
}

pub async fn verify(
    State(state): State<SharedState>,
    Path((id, hash)): Path<(String, String)>,
    Query(query): Query<SignedQuery>,
) -> Result<StatusCode, AppError> {
    let invalid = || AppError::Forbidden(INVALID_SIGNATURE.to_string());

    let id: Uuid = id.parse().map_err(|_| invalid())?;
    let expires: i64 = query
        .expires
        .as_deref()
        .and_then(|e| e.parse().ok())
        .ok_or_else(invalid)?;
    let signature = query.signature.ok_or_else(invalid)?;

    if state.verifier.verify(id, &hash, expires, &signature).await? == VerifyOutcome::Verified {
        state.metrics.record_email_verified();
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn resend(
    State(state): State<SharedState>,
    CurrentUser(user): CurrentUser,
) -> Json<MessageResponse> {
    let message = match state.verifier.resend(&user) {
        ResendOutcome::Sent => "Verification link sent!",
        ResendOutcome::AlreadyVerified => "Email already verified.",
    };
    Json(MessageResponse {
        message: message.to_string(),
    })
}
