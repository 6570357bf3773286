/// Persisted session tokens
use crate::{
    clock::SharedClock,
    db::account::SessionToken,
    error::{ApiError, ApiResult},
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Outcome of looking a token up, kept distinct for logging
#[derive(Debug, Clone)]
pub enum SessionLookup {
    Active(SessionToken),
    Revoked(SessionToken),
    Expired(SessionToken),
    Missing,
}

impl SessionLookup {
    pub fn reason(&self) -> &'static str {
        match self {
            SessionLookup::Active(_) => "active",
            SessionLookup::Revoked(_) => "revoked",
            SessionLookup::Expired(_) => "expired",
            SessionLookup::Missing => "missing",
        }
    }
}

/// Client details captured when a session is created
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub addr: String,
    pub agent: String,
}

/// Store of issued tokens; sole authority for revocation
pub struct SessionStore {
    db: SqlitePool,
    clock: SharedClock,
}

impl SessionStore {
    pub fn new(db: SqlitePool, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    /// Persist a newly issued token
    pub async fn record(
        &self,
        account_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
        client: &ClientInfo,
    ) -> ApiResult<SessionToken> {
        let now = self.clock.now();

        let id = sqlx::query(
            "INSERT INTO session_token
                (account_id, token, token_type, issued_at, expires_at, client_addr, client_agent, revoked)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
        )
        .bind(account_id)
        .bind(token)
        .bind(ACCESS_TOKEN_TYPE)
        .bind(now)
        .bind(expires_at)
        .bind(&client.addr)
        .bind(&client.agent)
        .execute(&self.db)
        .await?
        .last_insert_rowid();

        tracing::debug!(account_id, session_id = id, "session recorded");

        Ok(SessionToken {
            id,
            account_id,
            token: token.to_string(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            issued_at: now,
            expires_at,
            last_used_at: None,
            client_addr: client.addr.clone(),
            client_agent: client.agent.clone(),
            revoked: false,
            revoked_at: None,
        })
    }

    /// Classify a presented token
    pub async fn lookup(&self, token: &str) -> ApiResult<SessionLookup> {
        let query = format!(
            "SELECT {} FROM session_token WHERE token = ?1",
            SessionToken::COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(token)
            .fetch_optional(&self.db)
            .await?;

        let Some(row) = row else {
            return Ok(SessionLookup::Missing);
        };

        let session = SessionToken::from_row(&row)?;

        Ok(if session.revoked {
            SessionLookup::Revoked(session)
        } else if !session.is_usable_at(self.clock.now()) {
            SessionLookup::Expired(session)
        } else {
            SessionLookup::Active(session)
        })
    }

    /// Fetch a usable session; revoked and expired rows read as not found
    pub async fn lookup_active(&self, token: &str) -> ApiResult<SessionToken> {
        match self.lookup(token).await? {
            SessionLookup::Active(session) => Ok(session),
            _ => Err(ApiError::NotFound("Session not found".to_string())),
        }
    }

    /// Record use of a session. Failures are logged and swallowed.
    pub async fn touch(&self, session_id: i64) {
        let result = sqlx::query("UPDATE session_token SET last_used_at = ?1 WHERE id = ?2")
            .bind(self.clock.now())
            .bind(session_id)
            .execute(&self.db)
            .await;

        if let Err(e) = result {
            tracing::warn!(session_id, error = %e, "failed to update session last-used time");
        }
    }

    /// Revoke a single token. Revoking twice is a no-op.
    pub async fn revoke(&self, token: &str) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE session_token SET revoked = 1, revoked_at = ?1 WHERE token = ?2 AND revoked = 0",
        )
        .bind(self.clock.now())
        .bind(token)
        .execute(&self.db)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!("session revoked");
        }

        Ok(())
    }

    /// Revoke every live token of an account, returning how many were revoked
    pub async fn revoke_all_for_account(&self, account_id: i64) -> ApiResult<u64> {
        self.revoke_all_except(account_id, None).await
    }

    /// Revoke every live token of an account except one session
    pub async fn revoke_all_except(
        &self,
        account_id: i64,
        keep_session_id: Option<i64>,
    ) -> ApiResult<u64> {
        let result = sqlx::query(
            "UPDATE session_token SET revoked = 1, revoked_at = ?1
             WHERE account_id = ?2 AND revoked = 0 AND id != ?3",
        )
        .bind(self.clock.now())
        .bind(account_id)
        .bind(keep_session_id.unwrap_or(-1))
        .execute(&self.db)
        .await?;

        let revoked = result.rows_affected();
        if revoked > 0 {
            tracing::info!(account_id, revoked, "account sessions revoked");
        }

        Ok(revoked)
    }

    /// All sessions of an account, newest first
    pub async fn list_for_account(&self, account_id: i64) -> ApiResult<Vec<SessionToken>> {
        let query = format!(
            "SELECT {} FROM session_token WHERE account_id = ?1 ORDER BY id DESC",
            SessionToken::COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(account_id)
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(SessionToken::from_row).collect()
    }
}
