/// Appointment workflow
///
/// Scheduling of counseling appointments between students and counselors,
/// the status lifecycle, and the counseling records counselors attach to them.

mod manager;
mod status;

pub use manager::AppointmentManager;
pub use status::{role_may_transition, AppointmentStatus};

use crate::db::appointment::{Appointment, CounselingRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Appointment creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub counselor_id: i64,
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 480))]
    pub duration_minutes: i64,
    #[validate(length(min = 1, max = 50))]
    pub kind: String,
    #[validate(length(min = 1, max = 100))]
    pub topic: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
}

/// Status change request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    #[validate(length(max = 500))]
    pub remark: Option<String>,
}

/// Counseling record creation request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRecordRequest {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
    #[validate(length(max = 2000))]
    pub follow_up: Option<String>,
    #[serde(default)]
    pub is_private: bool,
}

/// Listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAppointmentsQuery {
    pub status: Option<AppointmentStatus>,
}

/// Appointment together with the records the caller may see
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub records: Vec<CounselingRecord>,
}

/// Listing response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAppointmentsResponse {
    pub appointments: Vec<Appointment>,
}
