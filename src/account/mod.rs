/// Account management
///
/// Handles registration, login, profiles, password changes and the
/// administrator's view of accounts.

mod manager;

pub use manager::AccountManager;

use crate::{
    auth::Role,
    db::account::{Account, AccountStatus, CounselorProfile, StudentProfile},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(length(min = 6, max = 50))]
    pub password: String,
    #[validate(length(max = 50))]
    pub name: Option<String>,
    /// Defaults to student when absent or empty
    pub role: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Public view of an account returned with credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub role: Role,
    pub email: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            name: account.name.clone(),
            role: account.role,
            email: account.email.clone(),
        }
    }
}

/// Login and registration response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AccountSummary,
}

/// Role-specific profile attached to an account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RoleProfile {
    Student(StudentProfile),
    Counselor(CounselorProfile),
}

/// Account together with its role profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub account: Account,
    pub profile: Option<RoleProfile>,
}

/// Contact details the owner may change
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 6, max = 50))]
    pub new_password: String,
}

/// Administrator status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: AccountStatus,
}

/// Account listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAccountsQuery {
    pub role: Option<Role>,
    pub status: Option<AccountStatus>,
}

/// Counselor directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselorSummary {
    pub id: i64,
    pub name: Option<String>,
    #[serde(flatten)]
    pub profile: CounselorProfile,
}
