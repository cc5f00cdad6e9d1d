use serde::Deserialize;
use uuid::Uuid;

use super::{ServiceError, ensure_assigned_doctor, load_appointment};
use crate::middleware::auth_context::AuthContext;
use crate::models::{Appointment, AppointmentStatus, Medication, NewPrescription, Prescription};
use crate::store::Store;

#[derive(Debug, Default, Deserialize)]
pub struct PrescriptionRequest {
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn tidy(m: Medication) -> Medication {
    Medication {
        name: m.name.trim().to_string(),
        dosage: m.dosage.trim().to_string(),
        frequency: m.frequency.trim().to_string(),
        duration: m.duration.trim().to_string(),
        instructions: m.instructions.trim().to_string(),
    }
}

/// Blank medication rows are dropped; at least one named medication must
/// remain. Dosage and the other free-text fields are not checked.
pub fn validate_prescription(
    appointment_id: Uuid,
    req: PrescriptionRequest,
) -> Result<NewPrescription, ServiceError> {
    let diagnosis = req.diagnosis.trim();
    if diagnosis.is_empty() {
        return Err(ServiceError::validation("VALIDATION_ERROR", "diagnosis is required"));
    }

    let medications: Vec<Medication> = req
        .medications
        .into_iter()
        .map(tidy)
        .filter(|m| !m.name.is_empty())
        .collect();
    if medications.is_empty() {
        return Err(ServiceError::validation(
            "VALIDATION_ERROR",
            "at least one medication with a name is required",
        ));
    }

    Ok(NewPrescription {
        appointment_id,
        diagnosis: diagnosis.to_string(),
        medications,
        notes: req.notes.as_deref().unwrap_or_default().trim().to_string(),
    })
}

pub async fn create_prescription(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
    req: PrescriptionRequest,
) -> Result<Prescription, ServiceError> {
    let a = load_appointment(store, appointment_id).await?;
    ensure_assigned_doctor(auth, &a)?;
    if a.status != AppointmentStatus::Completed {
        return Err(ServiceError::policy(
            "APPOINTMENT_NOT_COMPLETED",
            "Prescriptions can only be written for completed appointments",
        ));
    }
    let new = validate_prescription(appointment_id, req)?;

    let p = store.insert_prescription(new).await?;
    tracing::info!(prescription_id = %p.id, %appointment_id, "prescription issued");
    Ok(p)
}

/// Completes an in-progress appointment and issues its prescription together.
pub async fn complete_with_prescription(
    store: &dyn Store,
    auth: &AuthContext,
    appointment_id: Uuid,
    req: PrescriptionRequest,
) -> Result<(Appointment, Prescription), ServiceError> {
    let a = load_appointment(store, appointment_id).await?;
    ensure_assigned_doctor(auth, &a)?;
    if a.status != AppointmentStatus::InProgress {
        return Err(ServiceError::validation(
            "INVALID_TRANSITION",
            format!("Cannot complete an appointment that is {}", a.status),
        ));
    }
    let new = validate_prescription(appointment_id, req)?;

    let (a, p) = store.complete_with_prescription(new).await?;
    tracing::info!(prescription_id = %p.id, %appointment_id, "appointment completed with prescription");
    Ok((a, p))
}

/// Only the prescription's patient and doctor may read it.
pub async fn get_prescription(
    store: &dyn Store,
    auth: &AuthContext,
    prescription_id: Uuid,
) -> Result<Prescription, ServiceError> {
    let p = store
        .get_prescription(prescription_id)
        .await?
        .ok_or(ServiceError::NotFound("prescription"))?;

    if !auth.party().matches(p.patient_id, p.doctor_id) {
        tracing::warn!(%prescription_id, user_id = %auth.user_id, "prescription read refused");
        return Err(ServiceError::forbidden("This prescription belongs to someone else"));
    }
    Ok(p)
}

pub async fn list_prescriptions(
    store: &dyn Store,
    auth: &AuthContext,
) -> Result<Vec<Prescription>, ServiceError> {
    Ok(store.list_prescriptions(auth.party()).await?)
}
