//! Business rules. Each function takes the store and the caller's session
//! explicitly; nothing here reads ambient state.

use thiserror::Error;
use uuid::Uuid;

use crate::middleware::auth_context::AuthContext;
use crate::models::{Appointment, Role};
use crate::store::{Store, StoreError};

pub mod booking;
pub mod dashboard;
pub mod feedback;
pub mod identity;
pub mod lifecycle;
pub mod prescription;

/// Failure of a single user action. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input; fixed by correcting the input.
    #[error("{1}")]
    Validation(&'static str, String),
    /// A business rule refused the action (daily cap, duplicate feedback, ...).
    #[error("{1}")]
    Policy(&'static str, String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid credentials")]
    Unauthorized,
    /// Storage or infrastructure failure; the user may retry.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl ServiceError {
    pub fn validation(code: &'static str, msg: impl Into<String>) -> Self {
        ServiceError::Validation(code, msg.into())
    }

    pub fn policy(code: &'static str, msg: impl Into<String>) -> Self {
        ServiceError::Policy(code, msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ServiceError::Forbidden(msg.into())
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DailyCapReached(cap) => ServiceError::policy(
                "DAILY_LIMIT_REACHED",
                format!("You can book at most {cap} appointments per day"),
            ),
            StoreError::Duplicate("account") => {
                ServiceError::policy("EMAIL_TAKEN", "An account with this email already exists")
            }
            StoreError::Duplicate("prescription") => ServiceError::policy(
                "PRESCRIPTION_EXISTS",
                "A prescription was already written for this appointment",
            ),
            StoreError::Duplicate("feedback") => ServiceError::policy(
                "FEEDBACK_EXISTS",
                "Feedback was already submitted for this appointment",
            ),
            StoreError::Duplicate(what) => {
                ServiceError::policy("DUPLICATE", format!("{what} already exists"))
            }
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::StaleStatus => ServiceError::policy(
                "STALE_STATUS",
                "The appointment changed in the meantime, reload and try again",
            ),
            StoreError::InvalidState(status) => ServiceError::policy(
                "INVALID_APPOINTMENT_STATE",
                format!("Not allowed while the appointment is {status}"),
            ),
            StoreError::Backend(msg) => ServiceError::Backend(msg),
        }
    }
}

pub fn require_role(auth: &AuthContext, role: Role) -> Result<(), ServiceError> {
    if auth.role == role {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!("Only a {role} can do this")))
    }
}

pub(crate) async fn load_appointment(
    store: &dyn Store,
    appointment_id: Uuid,
) -> Result<Appointment, ServiceError> {
    store
        .get_appointment(appointment_id)
        .await?
        .ok_or(ServiceError::NotFound("appointment"))
}

/// The caller must be the patient or the doctor of the appointment.
pub(crate) fn ensure_participant(auth: &AuthContext, a: &Appointment) -> Result<(), ServiceError> {
    if auth.party().matches(a.patient_id, a.doctor_id) {
        Ok(())
    } else {
        Err(ServiceError::forbidden("This appointment belongs to someone else"))
    }
}

/// The caller must be the doctor assigned to the appointment.
pub(crate) fn ensure_assigned_doctor(auth: &AuthContext, a: &Appointment) -> Result<(), ServiceError> {
    require_role(auth, Role::Doctor)?;
    if a.doctor_id == auth.user_id {
        Ok(())
    } else {
        Err(ServiceError::forbidden("Doctor can only act on their own appointments"))
    }
}
