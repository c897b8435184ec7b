pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub const ROLE_RESEARCHER: &str = "researcher";
pub const ROLE_UNIT_PERSONNEL: &str = "unit_personnel";
pub const ROLE_UNIT_ADMIN: &str = "unit_admin";
pub const ROLE_SUPER_ADMIN: &str = "super_admin";

/// Roles allowed to register, replace and delete project files. Researchers
/// only read.
const FILE_MUTATION_ROLES: &[&str] = &[ROLE_UNIT_PERSONNEL, ROLE_UNIT_ADMIN, ROLE_SUPER_ADMIN];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub username: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn require_file_mutation(&self) -> AppResult<()> {
        if FILE_MUTATION_ROLES.iter().any(|role| *role == self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
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

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            username: claims.username,
            role: claims.role,
        })
    }
}
