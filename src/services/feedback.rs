use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use uuid::Uuid;

use super::{ServiceError, load_appointment, require_role};
use crate::middleware::auth_context::AuthContext;
use crate::models::{
    Appointment, AppointmentFilter, AppointmentStatus, Feedback, FeedbackStats, NewFeedback,
    Party, Role,
};
use crate::store::Store;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct FeedbackRequest {
    /// 0 means the patient has not picked a star yet.
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

pub fn validate_feedback(
    appointment_id: Uuid,
    patient_id: Uuid,
    req: &FeedbackRequest,
) -> Result<NewFeedback, ServiceError> {
    let rating = u8::try_from(req.rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
        .ok_or_else(|| {
            ServiceError::validation(
                "INVALID_RATING",
                format!("rating must be between {MIN_RATING} and {MAX_RATING}"),
            )
        })?;

    Ok(NewFeedback {
        appointment_id,
        patient_id,
        rating,
        comment: req.comment.as_deref().unwrap_or_default().trim().to_string(),
    })
}

pub async fn submit_feedback(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
    req: FeedbackRequest,
) -> Result<Feedback, ServiceError> {
    require_role(auth, Role::Patient)?;
    let new = validate_feedback(appointment_id, auth.user_id, &req)?;

    let a = load_appointment(store, appointment_id).await?;
    if a.patient_id != auth.user_id {
        return Err(ServiceError::forbidden("Only the patient of this appointment can review it"));
    }
    if a.status != AppointmentStatus::Completed {
        return Err(ServiceError::policy(
            "APPOINTMENT_NOT_COMPLETED",
            "Feedback can only be left for completed appointments",
        ));
    }
    let already = store
        .list_feedback(auth.party())
        .await?
        .iter()
        .any(|f| f.appointment_id == appointment_id);
    if already {
        tracing::warn!(%appointment_id, patient_id = %auth.user_id, "duplicate feedback refused");
        return Err(ServiceError::policy(
            "FEEDBACK_EXISTS",
            "Feedback was already submitted for this appointment",
        ));
    }

    let f = store.insert_feedback(new).await?;
    tracing::info!(feedback_id = %f.id, %appointment_id, rating = f.rating, "feedback recorded");
    Ok(f)
}

/// Feedback the patient gave, or the doctor received.
pub async fn list_feedback(
    store: &dyn Store,
    auth: &AuthContext,
) -> Result<Vec<Feedback>, ServiceError> {
    Ok(store.list_feedback(auth.party()).await?)
}

/// Completed appointments the patient has not reviewed yet.
pub async fn pending_feedback(
    store: &dyn Store,
    auth: &AuthContext,
) -> Result<Vec<Appointment>, ServiceError> {
    require_role(auth, Role::Patient)?;

    let reviewed: HashSet<Uuid> = store
        .list_feedback(auth.party())
        .await?
        .into_iter()
        .map(|f| f.appointment_id)
        .collect();

    let completed = store
        .list_appointments(AppointmentFilter {
            status: Some(AppointmentStatus::Completed),
            ..AppointmentFilter::for_party(auth.party())
        })
        .await?;

    Ok(completed
        .into_iter()
        .filter(|a| !reviewed.contains(&a.id))
        .collect())
}

/// Average is rounded half-up to one decimal, 0.0 without reviews.
pub fn compute_stats(feedback: &[Feedback]) -> FeedbackStats {
    let mut rating_distribution: BTreeMap<u8, usize> =
        (MIN_RATING..=MAX_RATING).map(|r| (r, 0)).collect();
    let mut sum: u64 = 0;
    let mut with_comment = 0;

    for f in feedback {
        *rating_distribution.entry(f.rating).or_default() += 1;
        sum += u64::from(f.rating);
        if !f.comment.trim().is_empty() {
            with_comment += 1;
        }
    }

    let total = feedback.len() as u64;
    let average_rating = if total == 0 {
        0.0
    } else {
        // tenths, rounded half-up in integers
        let tenths = (sum * 20 + total) / (total * 2);
        tenths as f64 / 10.0
    };

    FeedbackStats {
        total_reviews: feedback.len(),
        average_rating,
        rating_distribution,
        with_comment,
    }
}

pub async fn doctor_stats(store: &dyn Store, doctor_id: Uuid) -> Result<FeedbackStats, ServiceError> {
    store
        .get_profile(doctor_id)
        .await?
        .filter(|p| p.role == Role::Doctor)
        .ok_or(ServiceError::NotFound("doctor"))?;

    let feedback = store.list_feedback(Party::Doctor(doctor_id)).await?;
    Ok(compute_stats(&feedback))
}
