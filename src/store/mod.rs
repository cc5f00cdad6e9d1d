//! Storage boundary. Every collection the service touches (profiles, sessions,
//! appointments, prescriptions, feedback) goes through [`Store`].
//!
//! Implementations own the cross-request invariants: the daily booking cap,
//! forward-only status changes, one prescription per appointment and one
//! feedback per appointment and patient. Services check the same rules first
//! so callers get a precise error, but only the store check holds under
//! concurrent requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Account, Appointment, AppointmentFilter, AppointmentStatus, Feedback, NewAccount,
    NewAppointment, NewFeedback, NewPrescription, Party, Prescription, Role, UserProfile,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("daily booking limit of {0} reached")]
    DailyCapReached(usize),
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("appointment status changed concurrently")]
    StaleStatus,
    #[error("appointment is {0}")]
    InvalidState(AppointmentStatus),
    #[error("storage error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub profile: UserProfile,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait Store: Send + Sync {
    /* identity */

    /// Fails with `Duplicate("account")` when the email is taken.
    async fn create_account(&self, new: NewAccount) -> Result<UserProfile, StoreError>;
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;
    async fn list_profiles(&self, role: Role) -> Result<Vec<UserProfile>, StoreError>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError>;
    /// Unrevoked session whose expiry is after `now`.
    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError>;
    async fn revoke_session(&self, session_id: Uuid) -> Result<bool, StoreError>;

    /* appointments */

    /// Inserts a `pending` appointment unless the patient already holds
    /// `daily_cap` appointments on the same date. Check and insert are atomic.
    async fn insert_appointment(
        &self,
        new: NewAppointment,
        daily_cap: usize,
    ) -> Result<Appointment, StoreError>;
    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;
    /// Ordered by date then time.
    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError>;
    /// Compare-and-set: only applies when the stored status is still `from`.
    /// Pairs outside the lifecycle table fail with `InvalidState(from)`.
    async fn update_appointment_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment, StoreError>;

    /* prescriptions */

    /// Appointment must be `completed` and not yet prescribed.
    async fn insert_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError>;
    /// Moves an `in_progress` appointment to `completed` and attaches the
    /// prescription in one step; nothing is written on failure.
    async fn complete_with_prescription(
        &self,
        new: NewPrescription,
    ) -> Result<(Appointment, Prescription), StoreError>;
    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError>;
    async fn find_prescription_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Prescription>, StoreError>;
    /// Newest first.
    async fn list_prescriptions(&self, party: Party) -> Result<Vec<Prescription>, StoreError>;

    /* feedback */

    /// Appointment must be `completed`; one record per appointment and patient.
    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError>;
    /// Newest first.
    async fn list_feedback(&self, party: Party) -> Result<Vec<Feedback>, StoreError>;
}
