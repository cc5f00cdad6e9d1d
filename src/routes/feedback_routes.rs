// src/routes/feedback_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::{ApiJson, ApiPath},
    },
    models::{ApiOk, AppState, Appointment, Feedback, FeedbackStats, Role},
    services::{
        feedback::{self, FeedbackRequest},
        require_role,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments/{appointment_id}/feedback", post(submit_feedback))
        .route("/feedback", get(list_feedback))
        .route("/feedback/pending", get(pending_feedback))
        .route("/feedback/stats", get(my_stats))
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<FeedbackRequest>,
) -> Result<Json<ApiOk<Feedback>>, ApiError> {
    let f = feedback::submit_feedback(state.store.as_ref(), &auth, appointment_id, req).await?;
    Ok(Json(ApiOk { data: f }))
}

pub async fn list_feedback(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Feedback>>>, ApiError> {
    let rows = feedback::list_feedback(state.store.as_ref(), &auth).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn pending_feedback(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let rows = feedback::pending_feedback(state.store.as_ref(), &auth).await?;
    Ok(Json(ApiOk { data: rows }))
}

/// Aggregates over the calling doctor's feedback.
pub async fn my_stats(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<FeedbackStats>>, ApiError> {
    require_role(&auth, Role::Doctor)?;
    let stats = feedback::doctor_stats(state.store.as_ref(), auth.user_id).await?;
    Ok(Json(ApiOk { data: stats }))
}
