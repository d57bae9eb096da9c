use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{password, AuthenticatedUser},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let account = state
        .users
        .find_by_username(&payload.username)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    if !account.is_active {
        return Err(AppError::unauthorized());
    }

    let valid = password::verify_password(&payload.password, &account.password_hash)
        .map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    let access_token = state
        .jwt
        .generate_token(account.id, &account.username, &account.role_name)
        .map_err(AppError::from)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiry_minutes * 60,
    }))
}

/// Revokes the presented token until its natural expiry.
pub async fn logout(State(state): State<AppState>, user: AuthenticatedUser) -> StatusCode {
    state.revoked.revoke(&user.token, user.expires_at);
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role: String,
    pub permissions: Vec<String>,
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MeResponse>> {
    let permissions = state
        .coordinator
        .resolver()
        .permissions_for_role(&user.role)
        .await?;
    Ok(Json(MeResponse {
        user_id: user.user_id,
        username: user.username,
        role: user.role,
        permissions,
    }))
}
