//! Appointment status machine and the reads that sit next to it.
//!
//! ```text
//! pending ──> confirmed ──> in_progress ──> completed
//!    │            │
//!    └──> cancelled <┘
//! ```

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::{ServiceError, ensure_assigned_doctor, ensure_participant, load_appointment};
use crate::middleware::auth_context::AuthContext;
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, Role};
use crate::store::Store;

use AppointmentStatus::*;

pub fn allowed_targets(status: AppointmentStatus) -> &'static [AppointmentStatus] {
    status.next()
}

pub fn can_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    from.can_move_to(to)
}

/// What a client may offer the caller for one appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Confirm,
    Start,
    Complete,
    Cancel,
    WritePrescription,
    ViewPrescription,
    LeaveFeedback,
}

impl Action {
    fn for_target(target: AppointmentStatus) -> Option<Self> {
        match target {
            Confirmed => Some(Action::Confirm),
            InProgress => Some(Action::Start),
            Completed => Some(Action::Complete),
            Cancelled => Some(Action::Cancel),
            Pending => None,
        }
    }
}

pub async fn get_appointment(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> Result<Appointment, ServiceError> {
    let a = load_appointment(store, appointment_id).await?;
    ensure_participant(auth, &a)?;
    Ok(a)
}

/// Patients see what they booked, doctors what is assigned to them.
pub async fn list_appointments(
    store: &dyn Store,
    auth: &AuthContext,
    status: Option<AppointmentStatus>,
    date: Option<NaiveDate>,
) -> Result<Vec<Appointment>, ServiceError> {
    let filter = AppointmentFilter {
        party: auth.party(),
        status,
        date,
    };
    Ok(store.list_appointments(filter).await?)
}

pub async fn transition(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
    target: AppointmentStatus,
) -> Result<Appointment, ServiceError> {
    let current = load_appointment(store, appointment_id).await?;
    ensure_assigned_doctor(auth, &current)?;

    if !can_transition(current.status, target) {
        tracing::warn!(
            %appointment_id,
            from = %current.status,
            to = %target,
            "status transition rejected"
        );
        return Err(ServiceError::validation(
            "INVALID_TRANSITION",
            format!("Cannot move an appointment from {} to {}", current.status, target),
        ));
    }

    let updated = store
        .update_appointment_status(appointment_id, current.status, target)
        .await?;

    tracing::info!(%appointment_id, from = %current.status, to = %target, "appointment status changed");
    Ok(updated)
}

pub async fn available_actions(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
) -> Result<Vec<Action>, ServiceError> {
    let a = get_appointment(store, auth, appointment_id).await?;

    let mut actions = Vec::new();
    match auth.role {
        Role::Doctor => {
            actions.extend(
                allowed_targets(a.status)
                    .iter()
                    .filter_map(|t| Action::for_target(*t)),
            );
            if a.status == Completed {
                let prescribed = store.find_prescription_for_appointment(a.id).await?.is_some();
                actions.push(if prescribed {
                    Action::ViewPrescription
                } else {
                    Action::WritePrescription
                });
            }
        }
        Role::Patient => {
            if a.status == Completed {
                if store.find_prescription_for_appointment(a.id).await?.is_some() {
                    actions.push(Action::ViewPrescription);
                }
                let reviewed = store
                    .list_feedback(auth.party())
                    .await?
                    .iter()
                    .any(|f| f.appointment_id == a.id);
                if !reviewed {
                    actions.push(Action::LeaveFeedback);
                }
            }
        }
    }
    Ok(actions)
}
