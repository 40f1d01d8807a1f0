pub mod auth;
pub mod password;
pub mod users;
pub mod verification;

use axum::extract::FromRequest;
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppError;
use crate::rate_limit::throttle_verification;
use crate::state::SharedState;

/// `axum::Json` whose rejections use the JSON error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

pub fn api_routes(state: SharedState) -> Router<SharedState> {
    let throttled = Router::new()
        .route("/email/verify/{id}/{hash}", get(verification::verify))
        .route("/email/verify/resend", post(verification::resend))
        .layer(axum::middleware::from_fn_with_state(state, throttle_verification));

    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
        .route("/me", get(auth::me))
        // Password reset
        .route("/forgot-password", post(password::forgot_password))
        .route("/reset-password", post(password::reset_password))
        // Users
        .route("/users", get(users::index).post(users::store))
        .route(
            "/users/{id}",
            get(users::show).put(users::update).delete(users::destroy),
        )
        // Email verification
        .merge(throttled)
}
