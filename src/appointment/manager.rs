/// Appointment manager using runtime queries
use crate::{
    appointment::{
        role_may_transition, AppointmentDetail, AppointmentStatus, CreateAppointmentRequest,
        CreateRecordRequest, UpdateStatusRequest,
    },
    auth::{AuthContext, Role},
    clock::SharedClock,
    db::{
        account::CounselorProfile,
        appointment::{Appointment, CounselingRecord},
    },
    error::{ApiError, ApiResult},
};
use sqlx::SqlitePool;
use validator::Validate;

/// Appointment workflow service
pub struct AppointmentManager {
    db: SqlitePool,
    clock: SharedClock,
}

impl AppointmentManager {
    pub fn new(db: SqlitePool, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Book an appointment as a student
    pub async fn create(
        &self,
        actor: &AuthContext,
        req: CreateAppointmentRequest,
    ) -> ApiResult<Appointment> {
        if actor.role != Role::Student {
            return Err(ApiError::Forbidden(
                "Only students can book appointments".to_string(),
            ));
        }

        req.validate()?;

        let now = self.clock.now();
        if req.start_time <= now {
            return Err(ApiError::Validation(
                "Appointment must start in the future".to_string(),
            ));
        }

        let has_student_profile: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM student_profile WHERE account_id = ?1)",
        )
        .bind(actor.account_id)
        .fetch_one(&self.db)
        .await?;

        if !has_student_profile {
            return Err(ApiError::NotFound("Student profile not found".to_string()));
        }

        let counselor = self
            .counselor_profile(req.counselor_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Counselor not found".to_string()))?;

        if !counselor.available {
            return Err(ApiError::Validation(
                "Counselor is not accepting appointments".to_string(),
            ));
        }

        let id = sqlx::query(
            "INSERT INTO appointment
                (student_id, counselor_id, start_time, duration_minutes, kind, topic, description, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        )
        .bind(actor.account_id)
        .bind(req.counselor_id)
        .bind(req.start_time)
        .bind(req.duration_minutes)
        .bind(&req.kind)
        .bind(&req.topic)
        .bind(&req.description)
        .bind(AppointmentStatus::Pending.as_str())
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(
            appointment_id = id,
            student_id = actor.account_id,
            counselor_id = req.counselor_id,
            "appointment created"
        );

        Ok(Appointment {
            id,
            student_id: actor.account_id,
            counselor_id: req.counselor_id,
            start_time: req.start_time,
            duration_minutes: req.duration_minutes,
            kind: req.kind,
            topic: req.topic,
            description: req.description,
            status: AppointmentStatus::Pending,
            remark: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Appointments visible to the actor, newest start first
    pub async fn list(
        &self,
        actor: &AuthContext,
        status: Option<AppointmentStatus>,
    ) -> ApiResult<Vec<Appointment>> {
        let mut query = format!("SELECT {} FROM appointment WHERE 1 = 1", Appointment::COLUMNS);

        let scope = match actor.role {
            Role::Student => {
                query.push_str(" AND student_id = ?1");
                Some(actor.account_id)
            }
            Role::Counselor => {
                query.push_str(" AND counselor_id = ?1");
                Some(actor.account_id)
            }
            Role::Admin => None,
        };

        if status.is_some() {
            query.push_str(if scope.is_some() {
                " AND status = ?2"
            } else {
                " AND status = ?1"
            });
        }
        query.push_str(" ORDER BY start_time DESC, id DESC");

        let mut q = sqlx::query(&query);
        if let Some(account_id) = scope {
            q = q.bind(account_id);
        }
        if let Some(status) = status {
            q = q.bind(status.as_str());
        }

        let rows = q.fetch_all(&self.db).await?;
        rows.iter().map(Appointment::from_row).collect()
    }

    /// One appointment with the counseling records the actor may see
    pub async fn get(&self, actor: &AuthContext, id: i64) -> ApiResult<AppointmentDetail> {
        let appointment = self.load(id).await?;

        if !Self::is_party(actor, &appointment) {
            return Err(ApiError::Forbidden(
                "Not allowed to view this appointment".to_string(),
            ));
        }

        let records = self.records_visible_to(actor, &appointment).await?;

        Ok(AppointmentDetail {
            appointment,
            records,
        })
    }

    /// Move an appointment along its lifecycle
    pub async fn update_status(
        &self,
        actor: &AuthContext,
        id: i64,
        req: UpdateStatusRequest,
    ) -> ApiResult<Appointment> {
        req.validate()?;

        let appointment = self.load(id).await?;

        if !Self::is_party(actor, &appointment) {
            return Err(ApiError::Forbidden(
                "Not allowed to modify this appointment".to_string(),
            ));
        }

        let current = appointment.status;
        let next = req.status;

        if current.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "appointment is already {}",
                current
            )));
        }

        if !current.can_become(next) {
            return Err(ApiError::Validation(format!(
                "cannot change appointment from {} to {}",
                current, next
            )));
        }

        if !role_may_transition(actor.role, current, next) {
            return Err(ApiError::Forbidden(format!(
                "{} may not change appointment from {} to {}",
                actor.role, current, next
            )));
        }

        let now = self.clock.now();
        let result = sqlx::query(
            "UPDATE appointment SET status = ?1, remark = COALESCE(?2, remark), updated_at = ?3
             WHERE id = ?4 AND status = ?5",
        )
        .bind(next.as_str())
        .bind(&req.remark)
        .bind(now)
        .bind(id)
        .bind(current.as_str())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            tracing::info!(appointment_id = id, from = %current, to = %next, "lost status update race");
            return Err(ApiError::Conflict(
                "appointment status changed concurrently".to_string(),
            ));
        }

        tracing::info!(
            appointment_id = id,
            actor_id = actor.account_id,
            from = %current,
            to = %next,
            "appointment status changed"
        );

        Ok(Appointment {
            status: next,
            remark: req.remark.or(appointment.remark),
            updated_at: now,
            ..appointment
        })
    }

    /// Append a counseling record; only the assigned counselor may write
    pub async fn create_record(
        &self,
        actor: &AuthContext,
        appointment_id: i64,
        req: CreateRecordRequest,
    ) -> ApiResult<CounselingRecord> {
        let appointment = self.load(appointment_id).await?;

        if actor.role != Role::Counselor || appointment.counselor_id != actor.account_id {
            return Err(ApiError::Forbidden(
                "Only the assigned counselor can add records".to_string(),
            ));
        }

        req.validate()?;

        let now = self.clock.now();
        let id = sqlx::query(
            "INSERT INTO counseling_record (appointment_id, author_id, content, follow_up, is_private, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(appointment_id)
        .bind(actor.account_id)
        .bind(&req.content)
        .bind(&req.follow_up)
        .bind(req.is_private)
        .bind(now)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::info!(record_id = id, appointment_id, "counseling record added");

        Ok(CounselingRecord {
            id,
            appointment_id,
            author_id: actor.account_id,
            content: req.content,
            follow_up: req.follow_up,
            is_private: req.is_private,
            created_at: now,
        })
    }

    async fn load(&self, id: i64) -> ApiResult<Appointment> {
        let query = format!("SELECT {} FROM appointment WHERE id = ?1", Appointment::COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Appointment {} not found", id)))?;

        Appointment::from_row(&row)
    }

    async fn counselor_profile(&self, account_id: i64) -> ApiResult<Option<CounselorProfile>> {
        let row = sqlx::query(
            "SELECT account_id, title, specialty, introduction, department, office_location, available
             FROM counselor_profile WHERE account_id = ?1",
        )
        .bind(account_id)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(CounselorProfile::from_row).transpose()
    }

    async fn records_visible_to(
        &self,
        actor: &AuthContext,
        appointment: &Appointment,
    ) -> ApiResult<Vec<CounselingRecord>> {
        let sees_private = actor.role == Role::Admin
            || (actor.role == Role::Counselor && appointment.counselor_id == actor.account_id);

        let query = format!(
            "SELECT {} FROM counseling_record WHERE appointment_id = ?1 {} ORDER BY created_at, id",
            CounselingRecord::COLUMNS,
            if sees_private { "" } else { "AND is_private = 0" }
        );

        let rows = sqlx::query(&query)
            .bind(appointment.id)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(CounselingRecord::from_row).collect()
    }

    /// Admins, the owning student and the assigned counselor
    fn is_party(actor: &AuthContext, appointment: &Appointment) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Student => appointment.student_id == actor.account_id,
            Role::Counselor => appointment.counselor_id == actor.account_id,
        }
    }
}
