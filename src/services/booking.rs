use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;

use super::{ServiceError, require_role};
use crate::middleware::auth_context::AuthContext;
use crate::models::{Appointment, AppointmentFilter, NewAppointment, Role};
use crate::store::Store;

#[derive(Debug, Default, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Option<Uuid>,
    /// YYYY-MM-DD
    pub date: Option<String>,
    /// HH:MM
    pub time: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidBooking {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub note: String,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, ServiceError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ServiceError::validation(
            "VALIDATION_ERROR",
            format!("{field} is required"),
        )),
    }
}

/// Field checks only. Dates are compared without time of day, so booking for
/// later today is allowed.
pub fn validate_booking(req: &BookingRequest, today: NaiveDate) -> Result<ValidBooking, ServiceError> {
    let doctor_id = req
        .doctor_id
        .ok_or_else(|| ServiceError::validation("VALIDATION_ERROR", "doctor_id is required"))?;

    let date = NaiveDate::parse_from_str(required(&req.date, "date")?, "%Y-%m-%d")
        .map_err(|_| ServiceError::validation("VALIDATION_ERROR", "date must be YYYY-MM-DD"))?;

    let raw_time = required(&req.time, "time")?;
    let time = NaiveTime::parse_from_str(raw_time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M:%S"))
        .map_err(|_| ServiceError::validation("VALIDATION_ERROR", "time must be HH:MM"))?;

    if date < today {
        return Err(ServiceError::validation(
            "DATE_IN_PAST",
            "Appointments cannot be booked for a past date",
        ));
    }

    Ok(ValidBooking {
        doctor_id,
        date,
        time: time.format("%H:%M").to_string(),
        note: req.note.as_deref().unwrap_or_default().trim().to_string(),
    })
}

pub async fn submit_booking(
    store: &dyn Store,
    auth: &AuthContext,
    today: NaiveDate,
    daily_cap: usize,
    req: BookingRequest,
) -> Result<Appointment, ServiceError> {
    require_role(auth, Role::Patient)?;
    let booking = validate_booking(&req, today)?;

    let doctor = store
        .get_profile(booking.doctor_id)
        .await?
        .filter(|p| p.role == Role::Doctor)
        .ok_or(ServiceError::NotFound("doctor"))?;

    let same_day = store
        .list_appointments(AppointmentFilter {
            date: Some(booking.date),
            ..AppointmentFilter::for_party(auth.party())
        })
        .await?
        .len();
    if same_day >= daily_cap {
        tracing::warn!(patient_id = %auth.user_id, date = %booking.date, "daily booking limit reached");
        return Err(ServiceError::policy(
            "DAILY_LIMIT_REACHED",
            format!("You can book at most {daily_cap} appointments per day"),
        ));
    }

    // the store repeats the count atomically with the insert
    let appointment = store
        .insert_appointment(
            NewAppointment {
                patient_id: auth.user_id,
                patient_name: auth.name.clone(),
                doctor_id: doctor.id,
                doctor_name: doctor.name,
                date: booking.date,
                time: booking.time,
                note: booking.note,
            },
            daily_cap,
        )
        .await?;

    tracing::info!(
        appointment_id = %appointment.id,
        patient_id = %auth.user_id,
        doctor_id = %appointment.doctor_id,
        "appointment booked"
    );
    Ok(appointment)
}
