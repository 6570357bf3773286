/// Request authentication
use crate::{
    auth::{
        session::{SessionLookup, SessionStore},
        token::TokenIssuer,
        Role,
    },
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use std::sync::Arc;

/// Identity attached to an authenticated request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: i64,
    pub role: Role,
    pub session_id: i64,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .copied()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// The raw bearer token of an authenticated request
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .filter(|token| !token.is_empty())
}

/// Session lookup followed by token validation
pub struct AuthGate {
    sessions: Arc<SessionStore>,
    tokens: Arc<TokenIssuer>,
}

impl AuthGate {
    pub fn new(sessions: Arc<SessionStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self { sessions, tokens }
    }

    /// Resolve a presented token to an identity.
    ///
    /// Every failure surfaces as `Unauthenticated`; the reason is only logged.
    pub async fn authenticate(&self, token: Option<&str>) -> ApiResult<AuthContext> {
        let Some(token) = token else {
            tracing::debug!(reason = "missing_token", "authentication failed");
            return Err(ApiError::Unauthenticated);
        };

        let session = match self.sessions.lookup(token).await? {
            SessionLookup::Active(session) => session,
            other => {
                tracing::debug!(reason = other.reason(), "authentication failed");
                return Err(ApiError::Unauthenticated);
            }
        };

        self.sessions.touch(session.id).await;

        let claims = self.tokens.validate(token).map_err(|e| {
            tracing::warn!(
                reason = %e,
                session_id = session.id,
                "stored session carries an unusable token"
            );
            ApiError::Unauthenticated
        })?;

        let account_id = claims.account_id()?;
        if account_id != session.account_id {
            tracing::warn!(
                reason = "subject_mismatch",
                session_id = session.id,
                "token subject does not match session owner"
            );
            return Err(ApiError::Unauthenticated);
        }

        Ok(AuthContext {
            account_id,
            role: claims.role,
            session_id: session.id,
        })
    }
}

/// Authentication middleware; rejects the request unless a live session is presented
pub async fn authenticate(
    State(ctx): State<AppContext>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(req.headers());

    let auth = ctx.auth_gate.authenticate(token.as_deref()).await?;

    req.extensions_mut().insert(auth);
    if let Some(token) = token {
        req.extensions_mut().insert(BearerToken(token));
    }

    Ok(next.run(req).await)
}
