use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{SessionRecord, Store, StoreError};
use crate::models::{
    Account, Appointment, AppointmentFilter, AppointmentStatus, Feedback, NewAccount,
    NewAppointment, NewFeedback, NewPrescription, Party, Prescription, Role, UserProfile,
};

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: Uuid,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    sessions: HashMap<Uuid, SessionEntry>,
    appointments: HashMap<Uuid, Appointment>,
    prescriptions: Vec<Prescription>,
    feedback: Vec<Feedback>,
}

impl Tables {
    fn appointment_mut(&mut self, id: Uuid) -> Result<&mut Appointment, StoreError> {
        self.appointments
            .get_mut(&id)
            .ok_or(StoreError::NotFound("appointment"))
    }

    fn build_prescription(&self, a: &Appointment, new: NewPrescription) -> Prescription {
        Prescription {
            id: Uuid::new_v4(),
            appointment_id: a.id,
            patient_id: a.patient_id,
            patient_name: a.patient_name.clone(),
            doctor_id: a.doctor_id,
            doctor_name: a.doctor_name.clone(),
            diagnosis: new.diagnosis,
            medications: new.medications,
            notes: new.notes,
            created_at: Utc::now(),
        }
    }

    fn is_prescribed(&self, appointment_id: Uuid) -> bool {
        self.prescriptions
            .iter()
            .any(|p| p.appointment_id == appointment_id)
    }
}

/// Process-local store. A single write lock serialises every mutation, so the
/// check-then-write rules are atomic here.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T>(mut items: Vec<T>, created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_account(&self, new: NewAccount) -> Result<UserProfile, StoreError> {
        let mut t = self.tables.write().await;
        if t
            .accounts
            .values()
            .any(|a| a.profile.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Duplicate("account"));
        }

        let profile = UserProfile {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            role: new.role,
            created_at: Utc::now(),
        };
        t.accounts.insert(
            profile.id,
            Account {
                profile: profile.clone(),
                password_hash: new.password_hash,
            },
        );
        Ok(profile)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let t = self.tables.read().await;
        Ok(t
            .accounts
            .values()
            .find(|a| a.profile.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.accounts.get(&user_id).map(|a| a.profile.clone()))
    }

    async fn list_profiles(&self, role: Role) -> Result<Vec<UserProfile>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<UserProfile> = t
            .accounts
            .values()
            .filter(|a| a.profile.role == role)
            .map(|a| a.profile.clone())
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let mut t = self.tables.write().await;
        if !t.accounts.contains_key(&user_id) {
            return Err(StoreError::NotFound("account"));
        }
        let now = Utc::now();
        t.sessions.retain(|_, s| !s.revoked && s.expires_at > now);

        let session_id = Uuid::new_v4();
        t.sessions.insert(
            session_id,
            SessionEntry {
                user_id,
                token_hash: token_hash.to_string(),
                expires_at,
                revoked: false,
            },
        );
        Ok(session_id)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let t = self.tables.read().await;
        let found = t
            .sessions
            .iter()
            .find(|(_, s)| s.token_hash == token_hash && !s.revoked && s.expires_at > now);

        Ok(found.and_then(|(session_id, s)| {
            t.accounts.get(&s.user_id).map(|a| SessionRecord {
                session_id: *session_id,
                profile: a.profile.clone(),
                expires_at: s.expires_at,
            })
        }))
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.write().await;
        match t.sessions.get_mut(&session_id) {
            Some(s) if !s.revoked => {
                s.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_appointment(
        &self,
        new: NewAppointment,
        daily_cap: usize,
    ) -> Result<Appointment, StoreError> {
        let mut t = self.tables.write().await;
        let same_day = t
            .appointments
            .values()
            .filter(|a| a.patient_id == new.patient_id && a.date == new.date)
            .count();
        if same_day >= daily_cap {
            return Err(StoreError::DailyCapReached(daily_cap));
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            date: new.date,
            time: new.time,
            note: new.note,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        t.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.appointments.get(&id).cloned())
    }

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let t = self.tables.read().await;
        let mut out: Vec<Appointment> = t
            .appointments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.date, &a.time, a.created_at).cmp(&(b.date, &b.time, b.created_at)));
        Ok(out)
    }

    async fn update_appointment_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<Appointment, StoreError> {
        if !from.can_move_to(to) {
            return Err(StoreError::InvalidState(from));
        }
        let mut t = self.tables.write().await;
        let a = t.appointment_mut(id)?;
        if a.status != from {
            return Err(StoreError::StaleStatus);
        }
        a.status = to;
        a.updated_at = Utc::now();
        Ok(a.clone())
    }

    async fn insert_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError> {
        let mut t = self.tables.write().await;
        let a = t.appointment_mut(new.appointment_id)?.clone();
        if a.status != AppointmentStatus::Completed {
            return Err(StoreError::InvalidState(a.status));
        }
        if t.is_prescribed(a.id) {
            return Err(StoreError::Duplicate("prescription"));
        }

        let p = t.build_prescription(&a, new);
        t.prescriptions.push(p.clone());
        Ok(p)
    }

    async fn complete_with_prescription(
        &self,
        new: NewPrescription,
    ) -> Result<(Appointment, Prescription), StoreError> {
        let mut t = self.tables.write().await;
        let current = t.appointment_mut(new.appointment_id)?.status;
        if current != AppointmentStatus::InProgress {
            return Err(StoreError::InvalidState(current));
        }
        if t.is_prescribed(new.appointment_id) {
            return Err(StoreError::Duplicate("prescription"));
        }

        let a = t.appointment_mut(new.appointment_id)?;
        a.status = AppointmentStatus::Completed;
        a.updated_at = Utc::now();
        let a = a.clone();

        let p = t.build_prescription(&a, new);
        t.prescriptions.push(p.clone());
        Ok((a, p))
    }

    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let t = self.tables.read().await;
        Ok(t.prescriptions.iter().find(|p| p.id == id).cloned())
    }

    async fn find_prescription_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Prescription>, StoreError> {
        let t = self.tables.read().await;
        Ok(t
            .prescriptions
            .iter()
            .find(|p| p.appointment_id == appointment_id)
            .cloned())
    }

    async fn list_prescriptions(&self, party: Party) -> Result<Vec<Prescription>, StoreError> {
        let t = self.tables.read().await;
        let items: Vec<Prescription> = t
            .prescriptions
            .iter()
            .filter(|p| party.matches(p.patient_id, p.doctor_id))
            .cloned()
            .collect();
        Ok(newest_first(items, |p| p.created_at))
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        let mut t = self.tables.write().await;
        let a = t.appointment_mut(new.appointment_id)?.clone();
        if a.status != AppointmentStatus::Completed {
            return Err(StoreError::InvalidState(a.status));
        }
        if t
            .feedback
            .iter()
            .any(|f| f.appointment_id == a.id && f.patient_id == new.patient_id)
        {
            return Err(StoreError::Duplicate("feedback"));
        }

        let f = Feedback {
            id: Uuid::new_v4(),
            appointment_id: a.id,
            patient_id: new.patient_id,
            patient_name: a.patient_name,
            doctor_id: a.doctor_id,
            doctor_name: a.doctor_name,
            rating: new.rating,
            comment: new.comment,
            created_at: Utc::now(),
        };
        t.feedback.push(f.clone());
        Ok(f)
    }

    async fn list_feedback(&self, party: Party) -> Result<Vec<Feedback>, StoreError> {
        let t = self.tables.read().await;
        let items: Vec<Feedback> = t
            .feedback
            .iter()
            .filter(|f| party.matches(f.patient_id, f.doctor_id))
            .cloned()
            .collect();
        Ok(newest_first(items, |f| f.created_at))
    }
}
