use chrono::NaiveDate;
use serde::Serialize;

use super::{ServiceError, feedback};
use crate::middleware::auth_context::AuthContext;
use crate::models::{AppointmentFilter, AppointmentStatus, FeedbackStats, Role};
use crate::store::Store;

/// Landing payload; `view` names the default screen for the caller's role.
#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Dashboard {
    PatientDashboard {
        upcoming_appointments: usize,
        prescriptions: usize,
        awaiting_feedback: usize,
    },
    DoctorDashboard {
        todays_appointments: usize,
        pending_requests: usize,
        in_progress: usize,
        feedback: FeedbackStats,
    },
}

pub async fn dashboard(
    store: &dyn Store,
    auth: &AuthContext,
    today: NaiveDate,
) -> Result<Dashboard, ServiceError> {
    let mine = store
        .list_appointments(AppointmentFilter::for_party(auth.party()))
        .await?;

    match auth.role {
        Role::Patient => Ok(Dashboard::PatientDashboard {
            upcoming_appointments: mine
                .iter()
                .filter(|a| a.date >= today && !a.status.is_terminal())
                .count(),
            prescriptions: store.list_prescriptions(auth.party()).await?.len(),
            awaiting_feedback: feedback::pending_feedback(store, auth).await?.len(),
        }),
        Role::Doctor => Ok(Dashboard::DoctorDashboard {
            todays_appointments: mine
                .iter()
                .filter(|a| a.date == today && a.status != AppointmentStatus::Cancelled)
                .count(),
            pending_requests: mine
                .iter()
                .filter(|a| a.status == AppointmentStatus::Pending)
                .count(),
            in_progress: mine
                .iter()
                .filter(|a| a.status == AppointmentStatus::InProgress)
                .count(),
            feedback: feedback::compute_stats(&store.list_feedback(auth.party()).await?),
        }),
    }
}
