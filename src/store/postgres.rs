use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{SessionRecord, Store, StoreError};
use crate::models::{
    Account, Appointment, AppointmentFilter, AppointmentStatus, Feedback, Medication, NewAccount,
    NewAppointment, NewFeedback, NewPrescription, Party, Prescription, Role, UserProfile,
};

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Backend(format!("db error: {e}"))
    }
}

fn unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|d| d.is_unique_violation())
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = StoreError;

    fn try_from(r: ProfileRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: r.user_id,
            name: r.name,
            email: r.email,
            role: r.role.parse::<Role>().map_err(StoreError::Backend)?,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    #[sqlx(flatten)]
    profile: ProfileRow,
    password_hash: String,
}

#[derive(Debug, FromRow)]
struct SessionLookupRow {
    session_token_id: Uuid,
    expires_at: DateTime<Utc>,
    #[sqlx(flatten)]
    profile: ProfileRow,
}

#[derive(Debug, FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    patient_id: Uuid,
    patient_name: String,
    doctor_id: Uuid,
    doctor_name: String,
    appt_date: NaiveDate,
    appt_time: String,
    note: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = StoreError;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Appointment {
            id: r.appointment_id,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            doctor_id: r.doctor_id,
            doctor_name: r.doctor_name,
            date: r.appt_date,
            time: r.appt_time,
            note: r.note,
            status: r.status.parse().map_err(StoreError::Backend)?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PrescriptionRow {
    prescription_id: Uuid,
    appointment_id: Uuid,
    patient_id: Uuid,
    patient_name: String,
    doctor_id: Uuid,
    doctor_name: String,
    diagnosis: String,
    medications: Json<Vec<Medication>>,
    notes: String,
    created_at: DateTime<Utc>,
}

impl From<PrescriptionRow> for Prescription {
    fn from(r: PrescriptionRow) -> Self {
        Prescription {
            id: r.prescription_id,
            appointment_id: r.appointment_id,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            doctor_id: r.doctor_id,
            doctor_name: r.doctor_name,
            diagnosis: r.diagnosis,
            medications: r.medications.0,
            notes: r.notes,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct FeedbackRow {
    feedback_id: Uuid,
    appointment_id: Uuid,
    patient_id: Uuid,
    patient_name: String,
    doctor_id: Uuid,
    doctor_name: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = StoreError;

    fn try_from(r: FeedbackRow) -> Result<Self, Self::Error> {
        Ok(Feedback {
            id: r.feedback_id,
            appointment_id: r.appointment_id,
            patient_id: r.patient_id,
            patient_name: r.patient_name,
            doctor_id: r.doctor_id,
            doctor_name: r.doctor_name,
            rating: u8::try_from(r.rating)
                .map_err(|_| StoreError::Backend(format!("rating out of range: {}", r.rating)))?,
            comment: r.comment,
            created_at: r.created_at,
        })
    }
}

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, patient_id, patient_name, doctor_id, doctor_name,
    appt_date, appt_time, note, status, created_at, updated_at
"#;

const PRESCRIPTION_COLUMNS: &str = r#"
    prescription_id, appointment_id, patient_id, patient_name, doctor_id, doctor_name,
    diagnosis, medications, notes, created_at
"#;

const FEEDBACK_COLUMNS: &str = r#"
    feedback_id, appointment_id, patient_id, patient_name, doctor_id, doctor_name,
    rating, comment, created_at
"#;

/// `(column, id)` for the side of a record the party stands on.
fn party_column(party: Party) -> (&'static str, Uuid) {
    match party {
        Party::Patient(id) => ("patient_id", id),
        Party::Doctor(id) => ("doctor_id", id),
    }
}

pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Row-locks the appointment for the rest of the transaction.
    async fn lock_appointment(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Appointment, StoreError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1 FOR UPDATE");
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(StoreError::NotFound("appointment"))?
            .try_into()
    }

    async fn insert_prescription_tx(
        tx: &mut Transaction<'_, Postgres>,
        a: &Appointment,
        new: NewPrescription,
    ) -> Result<Prescription, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO prescription (
              prescription_id, appointment_id, patient_id, patient_name,
              doctor_id, doctor_name, diagnosis, medications, notes
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            RETURNING {PRESCRIPTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(a.id)
            .bind(a.patient_id)
            .bind(&a.patient_name)
            .bind(a.doctor_id)
            .bind(&a.doctor_name)
            .bind(&new.diagnosis)
            .bind(Json(&new.medications))
            .bind(&new.notes)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    StoreError::Duplicate("prescription")
                } else {
                    e.into()
                }
            })?;
        Ok(row.into())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_account(&self, new: NewAccount) -> Result<UserProfile, StoreError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO user_profile (user_id, name, email, role, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING user_id, name, email, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(new.role.as_str())
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if unique_violation(&e) {
                StoreError::Duplicate("account")
            } else {
                e.into()
            }
        })?;

        row.try_into()
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT user_id, name, email, role, created_at, password_hash
            FROM user_profile
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| -> Result<Account, StoreError> {
            Ok(Account {
                profile: r.profile.try_into()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, name, email, role, created_at
            FROM user_profile
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .map(UserProfile::try_from)
        .transpose()
    }

    async fn list_profiles(&self, role: Role) -> Result<Vec<UserProfile>, StoreError> {
        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, name, email, role, created_at
            FROM user_profile
            WHERE role = $1
            ORDER BY name ASC
            "#,
        )
        .bind(role.as_str())
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(UserProfile::try_from).collect()
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid, StoreError> {
        let session_token_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO session_token (session_token_id, user_id, session_token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING session_token_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.db)
        .await?;

        Ok(session_token_id)
    }

    async fn find_active_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, StoreError> {
        let row = sqlx::query_as::<_, SessionLookupRow>(
            r#"
            SELECT st.session_token_id, st.expires_at,
                   u.user_id, u.name, u.email, u.role, u.created_at
            FROM session_token st
            JOIN user_profile u ON u.user_id = st.user_id
            WHERE st.session_token_hash = $1
              AND st.revoked_at IS NULL
              AND st.expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        row.map(|r| -> Result<SessionRecord, StoreError> {
            Ok(SessionRecord {
                session_id: r.session_token_id,
                expires_at: r.expires_at,
                profile: r.profile.try_into()?,
            })
        })
        .transpose()
    }

    async fn revoke_session(&self, session_id: Uuid) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET revoked_at = now()
            WHERE session_token_id = $1
              AND revoked_at IS NULL
            "#,
        )
        .bind(session_id)
        .execute(&self.db)
        .await?;

        Ok(res.rows_affected() > 0)
    }

    async fn insert_appointment(
        &self,
        new: NewAppointment,
        daily_cap: usize,
    ) -> Result<Appointment, StoreError> {
        let mut tx = self.db.begin().await?;

        // serialise bookings per patient until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(new.patient_id.to_string())
            .execute(&mut *tx)
            .await?;

        let same_day: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM appointment
            WHERE patient_id = $1 AND appt_date = $2
            "#,
        )
        .bind(new.patient_id)
        .bind(new.date)
        .fetch_one(&mut *tx)
        .await?;

        if same_day >= daily_cap as i64 {
            return Err(StoreError::DailyCapReached(daily_cap));
        }

        let sql = format!(
            r#"
            INSERT INTO appointment (
              appointment_id, patient_id, patient_name, doctor_id, doctor_name,
              appt_date, appt_time, note, status
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,'pending')
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.patient_id)
            .bind(&new.patient_name)
            .bind(new.doctor_id)
            .bind(&new.doctor_name)
            .bind(new.date)
            .bind(&new.time)
            .bind(&new.note)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1");
        sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Appointment::try_from)
            .transpose()
    }

    async fn list_appointments(
        &self,
        filter: AppointmentFilter,
    ) -> Result<Vec<Appointment>, StoreError> {
        let (column, id) = party_column(filter.party);
        let sql = format!(
            r#"
            SELECT {APPOINTMENT_COLUMNS}
            FROM appointment
            WHERE {column} = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR appt_date = $3)
            ORDER BY appt_date ASC, appt_time ASC, created_at ASC
            "#
        );
        let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .bind(filter.status.map(AppointmentStatus::as_str))
            .bind(filter.date)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(Appointment::try_from).collect()
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
        let sql = format!(
            r#"
            UPDATE appointment
            SET status = $3, updated_at = now()
            WHERE appointment_id = $1 AND status = $2
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(&self.db)
            .await?;

        match row {
            Some(r) => r.try_into(),
            None if self.get_appointment(id).await?.is_some() => Err(StoreError::StaleStatus),
            None => Err(StoreError::NotFound("appointment")),
        }
    }

    async fn insert_prescription(&self, new: NewPrescription) -> Result<Prescription, StoreError> {
        let mut tx = self.db.begin().await?;
        let a = Self::lock_appointment(&mut tx, new.appointment_id).await?;
        if a.status != AppointmentStatus::Completed {
            return Err(StoreError::InvalidState(a.status));
        }

        let p = Self::insert_prescription_tx(&mut tx, &a, new).await?;
        tx.commit().await?;
        Ok(p)
    }

    async fn complete_with_prescription(
        &self,
        new: NewPrescription,
    ) -> Result<(Appointment, Prescription), StoreError> {
        let mut tx = self.db.begin().await?;
        let a = Self::lock_appointment(&mut tx, new.appointment_id).await?;
        if a.status != AppointmentStatus::InProgress {
            return Err(StoreError::InvalidState(a.status));
        }

        let sql = format!(
            r#"
            UPDATE appointment
            SET status = 'completed', updated_at = now()
            WHERE appointment_id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            "#
        );
        let completed: Appointment = sqlx::query_as::<_, AppointmentRow>(&sql)
            .bind(a.id)
            .fetch_one(&mut *tx)
            .await?
            .try_into()?;

        let p = Self::insert_prescription_tx(&mut tx, &completed, new).await?;
        tx.commit().await?;
        Ok((completed, p))
    }

    async fn get_prescription(&self, id: Uuid) -> Result<Option<Prescription>, StoreError> {
        let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescription WHERE prescription_id = $1");
        let row = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Prescription::from))
    }

    async fn find_prescription_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Prescription>, StoreError> {
        let sql = format!("SELECT {PRESCRIPTION_COLUMNS} FROM prescription WHERE appointment_id = $1");
        let row = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(appointment_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Prescription::from))
    }

    async fn list_prescriptions(&self, party: Party) -> Result<Vec<Prescription>, StoreError> {
        let (column, id) = party_column(party);
        let sql = format!(
            "SELECT {PRESCRIPTION_COLUMNS} FROM prescription WHERE {column} = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PrescriptionRow>(&sql)
            .bind(id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Prescription::from).collect())
    }

    async fn insert_feedback(&self, new: NewFeedback) -> Result<Feedback, StoreError> {
        let mut tx = self.db.begin().await?;
        let a = Self::lock_appointment(&mut tx, new.appointment_id).await?;
        if a.status != AppointmentStatus::Completed {
            return Err(StoreError::InvalidState(a.status));
        }

        let sql = format!(
            r#"
            INSERT INTO feedback (
              feedback_id, appointment_id, patient_id, patient_name,
              doctor_id, doctor_name, rating, comment
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(a.id)
            .bind(new.patient_id)
            .bind(&a.patient_name)
            .bind(a.doctor_id)
            .bind(&a.doctor_name)
            .bind(i16::from(new.rating))
            .bind(&new.comment)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if unique_violation(&e) {
                    StoreError::Duplicate("feedback")
                } else {
                    e.into()
                }
            })?;

        tx.commit().await?;
        row.try_into()
    }

    async fn list_feedback(&self, party: Party) -> Result<Vec<Feedback>, StoreError> {
        let (column, id) = party_column(party);
        let sql = format!(
            "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE {column} = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, FeedbackRow>(&sql)
            .bind(id)
            .fetch_all(&self.db)
            .await?;

        rows.into_iter().map(Feedback::try_from).collect()
    }
}
