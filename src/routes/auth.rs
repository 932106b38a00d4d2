use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app::AppState;
use crate::authz::{CurrentUserProvider, Identity, IdentitySnapshot};
use crate::errors::{AppError, AppResult};
use crate::models::user::{AuthResponse, LoginRequest, User};
use chrono::Utc;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state
        .store
        .verify_credentials(&payload.username, &payload.password)
        .await?
        .ok_or_else(|| AppError::not_authorized("invalid credentials"))?;

    let token = state.jwt.encode(user.id, Utc::now())?;
    tracing::info!(user_id = user.id, "token issued");

    Ok(Json(AuthResponse { token, user }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current user", body = User)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, Identity(identity): Identity) -> AppResult<Json<User>> {
    let snapshot = require_snapshot(identity.snapshot())?;
    let user = state
        .store
        .find_user(snapshot.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, existing tokens invalidated", body = MessageResponse),
        (status = 401, description = "Not authenticated or wrong password")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    Identity(identity): Identity,
    Json(payload): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let snapshot = require_snapshot(identity.snapshot())?;

    state
        .store
        .verify_credentials(&snapshot.username, &payload.old_password)
        .await?
        .ok_or_else(|| AppError::not_authorized("invalid credentials"))?;

    state.store.change_password(snapshot.user_id, &payload.new_password).await?;

    Ok(Json(MessageResponse {
        message: "Password changed".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/auth/invalidate-tokens",
    tag = "Auth",
    responses((status = 200, description = "All existing tokens invalidated", body = MessageResponse)),
    security(("bearerAuth" = []))
)]
pub async fn invalidate_tokens(
    State(state): State<AppState>,
    Identity(identity): Identity,
) -> AppResult<Json<MessageResponse>> {
    let snapshot = require_snapshot(identity.snapshot())?;
    state.store.invalidate_tokens(snapshot.user_id, Utc::now()).await?;

    Ok(Json(MessageResponse {
        message: "Tokens invalidated".to_string(),
    }))
}

fn require_snapshot(snapshot: Option<&IdentitySnapshot>) -> AppResult<&IdentitySnapshot> {
    snapshot.ok_or_else(|| AppError::not_authorized("authentication required"))
}
