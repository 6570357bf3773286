/// Appointment database models
use crate::{appointment::AppointmentStatus, error::ApiResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

/// Appointment record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub student_id: i64,
    pub counselor_id: i64,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub kind: String,
    pub topic: String,
    pub description: String,
    pub status: AppointmentStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub const COLUMNS: &'static str = "id, student_id, counselor_id, start_time, duration_minutes, \
         kind, topic, description, status, remark, created_at, updated_at";

    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let status: String = row.try_get("status")?;

        Ok(Appointment {
            id: row.try_get("id")?,
            student_id: row.try_get("student_id")?,
            counselor_id: row.try_get("counselor_id")?,
            start_time: row.try_get("start_time")?,
            duration_minutes: row.try_get("duration_minutes")?,
            kind: row.try_get("kind")?,
            topic: row.try_get("topic")?,
            description: row.try_get("description")?,
            status: status.parse()?,
            remark: row.try_get("remark")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Counselor note attached to an appointment. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselingRecord {
    pub id: i64,
    pub appointment_id: i64,
    pub author_id: i64,
    pub content: String,
    pub follow_up: Option<String>,
    pub is_private: bool,
    pub created_at: DateTime<Utc>,
}

impl CounselingRecord {
    pub const COLUMNS: &'static str =
        "id, appointment_id, author_id, content, follow_up, is_private, created_at";

    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(CounselingRecord {
            id: row.try_get("id")?,
            appointment_id: row.try_get("appointment_id")?,
            author_id: row.try_get("author_id")?,
            content: row.try_get("content")?,
            follow_up: row.try_get("follow_up")?,
            is_private: row.try_get("is_private")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
