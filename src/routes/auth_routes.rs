use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::ApiJson,
    },
    models::{ApiOk, AppState, OkData, UserProfile},
    services::{
        ServiceError,
        identity::{self, LoginOutcome, LoginRequest, RegisterRequest},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    let profile = identity::register(state.store.as_ref(), &state.email_domain, req).await?;
    Ok(Json(ApiOk { data: profile }))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiOk<LoginOutcome>>, ApiError> {
    let outcome = identity::login(state.store.as_ref(), state.session_ttl_hours, req).await?;
    Ok(Json(ApiOk { data: outcome }))
}

pub async fn logout(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    identity::logout(state.store.as_ref(), &auth)
        .await
        .map_err(|e| match e {
            ServiceError::Unauthorized => ApiError::session_expired(),
            other => other.into(),
        })?;
    Ok(Json(ApiOk {
        data: OkData { ok: true },
    }))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<UserProfile>>, ApiError> {
    let profile = identity::current_profile(state.store.as_ref(), &auth).await?;
    Ok(Json(ApiOk { data: profile }))
}
