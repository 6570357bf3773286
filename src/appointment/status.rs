/// Appointment lifecycle states and the transition rules between them
use crate::{
    auth::Role,
    error::{ApiError, ApiResult},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Canceled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Canceled => "canceled",
            AppointmentStatus::Completed => "completed",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Canceled | AppointmentStatus::Completed)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph
    pub fn can_become(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        matches!(
            (self, next),
            (Pending, Confirmed) | (Pending, Canceled) | (Confirmed, Canceled) | (Confirmed, Completed)
        )
    }
}

impl FromStr for AppointmentStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            // both spellings appear in client code
            "canceled" | "cancelled" => Ok(AppointmentStatus::Canceled),
            "completed" => Ok(AppointmentStatus::Completed),
            _ => Err(ApiError::Validation(format!(
                "Invalid appointment status: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a role may take an edge of the graph.
///
/// Callers must already have checked `can_become` and the actor's relation
/// to the appointment.
pub fn role_may_transition(role: Role, from: AppointmentStatus, to: AppointmentStatus) -> bool {
    use AppointmentStatus::*;

    match role {
        Role::Admin => true,
        Role::Counselor => true,
        Role::Student => matches!((from, to), (Pending, Canceled) | (Confirmed, Canceled)),
    }
}
