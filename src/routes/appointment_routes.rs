// src/routes/appointment_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    middleware::{
        auth_context::AuthContext,
        extract::{ApiJson, ApiPath, ApiQuery},
    },
    models::{ApiOk, AppState, Appointment, AppointmentStatus, Prescription},
    services::{
        booking::{self, BookingRequest},
        lifecycle::{self, Action},
        prescription::{self, PrescriptionRequest},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/actions", get(get_actions))
        .route("/appointments/{appointment_id}/status", post(change_status))
        .route("/appointments/{appointment_id}/complete", post(complete_appointment))
}

/* ============================================================
   Query params / bodies
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
    // YYYY-MM-DD
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Serialize)]
pub struct ActionsDto {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize)]
pub struct CompletedDto {
    pub appointment: Appointment,
    pub prescription: Prescription,
}

/* ============================================================
   POST /appointments (patient booking)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<BookingRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let today = Utc::now().date_naive();
    let appointment = booking::submit_booking(
        state.store.as_ref(),
        &auth,
        today,
        state.daily_booking_cap,
        req,
    )
    .await?;
    Ok(Json(ApiOk { data: appointment }))
}

/* ============================================================
   GET /appointments
   ============================================================ */

pub async fn list_appointments(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiQuery(q): ApiQuery<ListQuery>,
) -> Result<Json<ApiOk<Vec<Appointment>>>, ApiError> {
    let date = q
        .date
        .as_deref()
        .map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d"))
        .transpose()
        .map_err(|_| ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into()))?;

    let rows = lifecycle::list_appointments(state.store.as_ref(), &auth, q.status, date).await?;
    Ok(Json(ApiOk { data: rows }))
}

/* ============================================================
   GET /appointments/{id}
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let a = lifecycle::get_appointment(state.store.as_ref(), &auth, appointment_id).await?;
    Ok(Json(ApiOk { data: a }))
}

pub async fn get_actions(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
) -> Result<Json<ApiOk<ActionsDto>>, ApiError> {
    let store = state.store.as_ref();
    let actions = lifecycle::available_actions(store, &auth, appointment_id).await?;
    let a = lifecycle::get_appointment(store, &auth, appointment_id).await?;

    Ok(Json(ApiOk {
        data: ActionsDto {
            appointment_id,
            status: a.status,
            actions,
        },
    }))
}

/* ============================================================
   Status transitions (assigned doctor only)
   ============================================================ */

pub async fn change_status(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<StatusChangeRequest>,
) -> Result<Json<ApiOk<Appointment>>, ApiError> {
    let a = lifecycle::transition(state.store.as_ref(), &auth, appointment_id, req.status).await?;
    Ok(Json(ApiOk { data: a }))
}

pub async fn complete_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiPath(appointment_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<PrescriptionRequest>,
) -> Result<Json<ApiOk<CompletedDto>>, ApiError> {
    let (appointment, prescription) =
        prescription::complete_with_prescription(state.store.as_ref(), &auth, appointment_id, req)
            .await?;
    Ok(Json(ApiOk {
        data: CompletedDto {
            appointment,
            prescription,
        },
    }))
}
