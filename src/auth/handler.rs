//! HTTP handlers for the account boundary: signup, login, user listing.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::state::AppState;

use super::store::{AuthError, UserProfile};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// `POST /signup`: create an account.
///
/// Rejects with a client error when any field is missing or empty, or
/// when the email already has an account.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> impl IntoResponse {
    if request.username.trim().is_empty()
        || request.email.trim().is_empty()
        || request.password.is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "username, email and password are required"})),
        );
    }

    match state
        .users
        .signup(request.username, request.email, &request.password)
        .await
    {
        Ok(()) => (StatusCode::CREATED, Json(json!({"status": "created"}))),
        Err(AuthError::EmailTaken) => (
            StatusCode::CONFLICT,
            Json(json!({"error": "email already registered"})),
        ),
        Err(AuthError::InvalidCredentials) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "unexpected error"})),
        ),
    }
}

/// `POST /login`: verify credentials and issue a bearer token.
///
/// Failure is one generic 401, without distinguishing a missing user
/// from a wrong password.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, StatusCode> {
    let profile = state
        .users
        .verify_login(&request.email, &request.password)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let token = state.tokens.issue(&profile.email).map_err(|e| {
        tracing::error!("failed to issue token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(LoginResponse {
        token,
        user: profile,
    }))
}

/// `GET /users`: all stored user records, unfiltered (no password
/// material is ever stored in the profile projection)
pub async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<UserProfile>> {
    Json(state.users.all_profiles().await)
}
