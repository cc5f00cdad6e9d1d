use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{Authorization, authorization::Bearer};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{AppState, Party, Role};
use crate::services::ServiceError;
use crate::services::identity::hash_access_token;

/// Per-request session context. Built from the bearer token on every request,
/// created at login and dead after logout.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
    pub name: String,
    pub email: String,
    pub session_id: Uuid,
}

impl AuthContext {
    pub fn party(&self) -> Party {
        match self.role {
            Role::Patient => Party::Patient(self.user_id),
            Role::Doctor => Party::Doctor(self.user_id),
        }
    }
}

impl FromRequestParts<AppState> for AuthContext {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::session_expired())?;

            let token_hash = hash_access_token(authz.token());

            let session = state
                .store
                .find_active_session(&token_hash, Utc::now())
                .await
                .map_err(|e| ApiError::from(ServiceError::from(e)))?
                .ok_or_else(ApiError::session_expired)?;

            Ok(AuthContext {
                user_id: session.profile.id,
                role: session.profile.role,
                name: session.profile.name,
                email: session.profile.email,
                session_id: session.session_id,
            })
        }
    }
}
