pub mod jwt;
pub mod password;
pub mod revocation;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use chrono::{DateTime, TimeZone, Utc};

use crate::authz::{Principal, RoleKind};
use crate::error::AppError;
use crate::state::AppState;

/// A verified bearer identity. Verification (signature, expiry, revocation
/// list) happens here, before any handler runs.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedUser {
    /// Maps the raw role name onto the closed role vocabulary. Unknown roles
    /// cannot act on anything.
    pub fn principal(&self) -> Result<Principal, AppError> {
        let role = RoleKind::from_name(&self.role).ok_or_else(AppError::forbidden)?;
        Ok(Principal {
            user_id: self.user_id,
            role,
            role_name: self.role.clone(),
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized())?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized())?;

        if state.revoked.is_revoked(bearer.token()) {
            return Err(AppError::unauthorized());
        }

        let expires_at = Utc
            .timestamp_opt(claims.exp as i64, 0)
            .single()
            .ok_or_else(AppError::unauthorized)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
            token: bearer.token().to_string(),
            expires_at,
        })
    }
}
