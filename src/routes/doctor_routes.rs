use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::ApiPath,
    },
    models::{ApiOk, AppState, FeedbackStats, Role, UserProfile},
    services::{ServiceError, feedback},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors))
        .route("/doctors/{doctor_id}/feedback/stats", get(doctor_stats))
}

/// Doctors a patient can pick from when booking.
pub async fn list_doctors(
    State(state): State<AppState>,
    _auth: AuthContext,
) -> Result<Json<ApiOk<Vec<UserProfile>>>, ApiError> {
    let doctors = state
        .store
        .list_profiles(Role::Doctor)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(ApiOk { data: doctors }))
}

pub async fn doctor_stats(
    State(state): State<AppState>,
    _auth: AuthContext,
    ApiPath(doctor_id): ApiPath<Uuid>,
) -> Result<Json<ApiOk<FeedbackStats>>, ApiError> {
    let stats = feedback::doctor_stats(state.store.as_ref(), doctor_id).await?;
    Ok(Json(ApiOk { data: stats }))
}
