/// Roles and the role gate
use crate::{
    auth::AuthContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Counselor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Counselor => "counselor",
            Role::Admin => "admin",
        }
    }

    /// Roles that may be chosen at self-registration
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::Student | Role::Counselor)
    }
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> ApiResult<Self> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "counselor" => Ok(Role::Counselor),
            "admin" => Ok(Role::Admin),
            _ => Err(ApiError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed-role check applied after authentication
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Arc<[Role]>,
}

impl RoleGate {
    pub fn require(roles: &[Role]) -> Self {
        Self {
            allowed: roles.into(),
        }
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    /// Check an optional authenticated context against the allowed set
    pub fn check(&self, ctx: Option<&AuthContext>) -> ApiResult<()> {
        let ctx = ctx.ok_or(ApiError::Unauthenticated)?;

        if self.allows(ctx.role) {
            Ok(())
        } else {
            tracing::debug!(
                account_id = ctx.account_id,
                role = %ctx.role,
                "role not permitted for route"
            );
            Err(ApiError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

/// Role enforcement middleware; must run inside the authentication layer
pub async fn enforce_roles(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate.check(req.extensions().get::<AuthContext>())?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> AuthContext {
        AuthContext {
            account_id: 7,
            role,
            session_id: 1,
        }
    }

    #[test]
    fn test_role_round_trip_strings() {
        assert_eq!("Counselor".parse::<Role>().unwrap(), Role::Counselor);
        assert_eq!(Role::Admin.to_string(), "admin");
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_admin_gate() {
        let gate = RoleGate::require(&[Role::Admin]);

        assert!(matches!(
            gate.check(Some(&ctx(Role::Student))),
            Err(ApiError::Forbidden(_))
        ));
        assert!(gate.check(Some(&ctx(Role::Admin))).is_ok());
    }

    #[test]
    fn test_missing_context_is_unauthenticated() {
        let gate = RoleGate::require(&[Role::Student, Role::Counselor]);
        assert!(matches!(gate.check(None), Err(ApiError::Unauthenticated)));
    }

    #[test]
    fn test_self_assignable_roles() {
        assert!(Role::Student.is_self_assignable());
        assert!(Role::Counselor.is_self_assignable());
        assert!(!Role::Admin.is_self_assignable());
    }
}
