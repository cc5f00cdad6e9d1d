// src/routes/prescription_routes.rs

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
    models::{ApiOk, AppState, Prescription},
    services::prescription::{self, PrescriptionRequest},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments/{appointment_id}/prescription", post(create_prescription))
        .route("/prescriptions", get(list_prescriptions))
        .route("/prescriptions/{prescription_id}", get(get_prescription))
}

pub async fn create_prescription(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PrescriptionRequest>,
) -> Result<Json<ApiOk<Prescription>>, ApiError> {
    let p = prescription::create_prescription(state.store.as_ref(), &auth, appointment_id, req).await?;
    Ok(Json(ApiOk { data: p }))
}

/// Patient: received. Doctor: issued. Newest first.
pub async fn list_prescriptions(
    State(state): State<AppState>,
    auth: AuthContext,
) -> Result<Json<ApiOk<Vec<Prescription>>>, ApiError> {
    let rows = prescription::list_prescriptions(state.store.as_ref(), &auth).await?;
    Ok(Json(ApiOk { data: rows }))
}

pub async fn get_prescription(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(prescription_id): ApiPath<Uuid>,
) -> Result<Json<ApiOk<Prescription>>, ApiError> {
    let p = prescription::get_prescription(state.store.as_ref(), &auth, prescription_id).await?;
    Ok(Json(ApiOk { data: p }))
}
