/// Account database models
use crate::{
    auth::Role,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteRow, Row};
use std::{fmt, str::FromStr};

/// Account lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Blocked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Blocked => "blocked",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            "blocked" => Ok(AccountStatus::Blocked),
            _ => Err(ApiError::Validation(format!("Invalid account status: {}", s))),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account record in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub const COLUMNS: &'static str =
        "id, username, password_hash, name, email, phone, role, status, created_at, updated_at";

    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;

        Ok(Account {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            role: role.parse()?,
            status: status.parse()?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Student extension of an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    pub account_id: i64,
    pub student_number: Option<String>,
    pub major: Option<String>,
    pub class_name: Option<String>,
    pub grade: Option<String>,
    pub dormitory: Option<String>,
}

impl StudentProfile {
    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(StudentProfile {
            account_id: row.try_get("account_id")?,
            student_number: row.try_get("student_number")?,
            major: row.try_get("major")?,
            class_name: row.try_get("class_name")?,
            grade: row.try_get("grade")?,
            dormitory: row.try_get("dormitory")?,
        })
    }
}

/// Counselor extension of an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselorProfile {
    pub account_id: i64,
    pub title: Option<String>,
    pub specialty: Option<String>,
    pub introduction: Option<String>,
    pub department: Option<String>,
    pub office_location: Option<String>,
    pub available: bool,
}

impl CounselorProfile {
    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(CounselorProfile {
            account_id: row.try_get("account_id")?,
            title: row.try_get("title")?,
            specialty: row.try_get("specialty")?,
            introduction: row.try_get("introduction")?,
            department: row.try_get("department")?,
            office_location: row.try_get("office_location")?,
            available: row.try_get("available")?,
        })
    }
}

/// Issued credential record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub id: i64,
    pub account_id: i64,
    #[serde(skip_serializing, default)]
    pub token: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub client_addr: String,
    pub client_agent: String,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub const COLUMNS: &'static str = "id, account_id, token, token_type, issued_at, expires_at, \
         last_used_at, client_addr, client_agent, revoked, revoked_at";

    pub fn from_row(row: &SqliteRow) -> ApiResult<Self> {
        Ok(SessionToken {
            id: row.try_get("id")?,
            account_id: row.try_get("account_id")?,
            token: row.try_get("token")?,
            token_type: row.try_get("token_type")?,
            issued_at: row.try_get("issued_at")?,
            expires_at: row.try_get("expires_at")?,
            last_used_at: row.try_get("last_used_at")?,
            client_addr: row.try_get("client_addr")?,
            client_agent: row.try_get("client_agent")?,
            revoked: row.try_get("revoked")?,
            revoked_at: row.try_get("revoked_at")?,
        })
    }

    /// Usable only while unexpired and not revoked
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}
