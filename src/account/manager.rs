/// Account manager implementation using runtime queries
use crate::{
    account::{
        AccountSummary, AuthResponse, ChangePasswordRequest, CounselorSummary, ListAccountsQuery,
        LoginRequest, ProfileResponse, RegisterRequest, RoleProfile, UpdateProfileRequest,
    },
    auth::{AuthContext, ClientInfo, PasswordVault, Role, SessionStore, TokenIssuer},
    clock::SharedClock,
    db::{
        self,
        account::{Account, AccountStatus, CounselorProfile, StudentProfile},
    },
    error::{ApiError, ApiResult},
};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use validator::Validate;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    sessions: Arc<SessionStore>,
    tokens: Arc<TokenIssuer>,
    vault: PasswordVault,
    clock: SharedClock,
}

impl AccountManager {
    pub fn new(
        db: SqlitePool,
        sessions: Arc<SessionStore>,
        tokens: Arc<TokenIssuer>,
        vault: PasswordVault,
        clock: SharedClock,
    ) -> Self {
        Self {
            db,
            sessions,
            tokens,
            vault,
            clock,
        }
    }

    /// Create an account with its role profile and sign it in
    pub async fn register(&self, req: RegisterRequest, client: &ClientInfo) -> ApiResult<AuthResponse> {
        req.validate()?;
        PasswordVault::check_length(&req.password)?;

        let role = match req.role.as_deref().map(str::trim) {
            None | Some("") => Role::Student,
            Some(role) => role.parse()?,
        };

        if !role.is_self_assignable() {
            return Err(ApiError::Validation(format!(
                "Role {} cannot be chosen at registration",
                role
            )));
        }

        if self.username_exists(&req.username).await? {
            return Err(ApiError::Conflict(format!(
                "Username {} already taken",
                req.username
            )));
        }

        let password_hash = self.vault.hash_blocking(req.password).await?;
        let name = req.name.filter(|n| !n.trim().is_empty());

        let account = self
            .insert_with_profile(&req.username, &password_hash, name, role)
            .await?;

        tracing::info!(account_id = account.id, role = %role, "account registered");

        self.start_session(&account, client).await
    }

    /// Check credentials and start a session
    pub async fn login(&self, req: LoginRequest, client: &ClientInfo) -> ApiResult<AuthResponse> {
        req.validate()?;

        let Some(account) = self.find_by_username(&req.username).await? else {
            // Spend the same bcrypt work as a real check
            self.vault
                .verify_blocking(req.password, self.vault.decoy_digest())
                .await?;
            tracing::debug!(reason = "unknown_user", "login failed");
            return Err(ApiError::Unauthenticated);
        };

        let verified = self
            .vault
            .verify_blocking(req.password, account.password_hash.clone())
            .await?;

        if !verified {
            tracing::debug!(account_id = account.id, reason = "bad_password", "login failed");
            return Err(ApiError::Unauthenticated);
        }

        if !account.is_active() {
            tracing::info!(account_id = account.id, status = %account.status, "login refused for disabled account");
            return Err(ApiError::Forbidden("Account is disabled".to_string()));
        }

        tracing::info!(account_id = account.id, client_addr = %client.addr, "login succeeded");

        self.start_session(&account, client).await
    }

    /// Revoke the presented token
    pub async fn logout(&self, token: &str) -> ApiResult<()> {
        self.sessions.revoke(token).await
    }

    /// Account with its role profile
    pub async fn profile(&self, account_id: i64) -> ApiResult<ProfileResponse> {
        let account = self.get_account(account_id).await?;
        let profile = self.role_profile(&account).await?;

        Ok(ProfileResponse { account, profile })
    }

    /// Change the owner's contact details
    pub async fn update_profile(
        &self,
        account_id: i64,
        req: UpdateProfileRequest,
    ) -> ApiResult<ProfileResponse> {
        req.validate()?;

        let result = sqlx::query(
            "UPDATE account SET
                name = COALESCE(?1, name),
                email = COALESCE(?2, email),
                phone = COALESCE(?3, phone),
                updated_at = ?4
             WHERE id = ?5",
        )
        .bind(&req.name)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(self.clock.now())
        .bind(account_id)
        .execute(&self.db)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ApiError::Conflict("Email already registered".to_string())
            } else {
                ApiError::Database(e)
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Account not found".to_string()));
        }

        self.profile(account_id).await
    }

    /// Replace the password and revoke every other session
    pub async fn change_password(
        &self,
        actor: &AuthContext,
        req: ChangePasswordRequest,
    ) -> ApiResult<()> {
        req.validate()?;
        PasswordVault::check_length(&req.new_password)?;

        let account = self.get_account(actor.account_id).await?;

        let verified = self
            .vault
            .verify_blocking(req.old_password, account.password_hash)
            .await?;
        if !verified {
            return Err(ApiError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = self.vault.hash_blocking(req.new_password).await?;

        sqlx::query("UPDATE account SET password_hash = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(&password_hash)
            .bind(self.clock.now())
            .bind(actor.account_id)
            .execute(&self.db)
            .await?;

        self.sessions
            .revoke_all_except(actor.account_id, Some(actor.session_id))
            .await?;

        tracing::info!(account_id = actor.account_id, "password changed");

        Ok(())
    }

    /// Accounts, optionally filtered by role and status
    pub async fn list_accounts(&self, filter: &ListAccountsQuery) -> ApiResult<Vec<Account>> {
        let query = format!(
            "SELECT {} FROM account
             WHERE (?1 IS NULL OR role = ?1) AND (?2 IS NULL OR status = ?2)
             ORDER BY id",
            Account::COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(filter.role.map(|r| r.as_str()))
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;

        rows.iter().map(Account::from_row).collect()
    }

    /// Enable or disable an account. Disabling revokes its sessions.
    pub async fn set_status(
        &self,
        actor: &AuthContext,
        account_id: i64,
        status: AccountStatus,
    ) -> ApiResult<Account> {
        if actor.account_id == account_id {
            return Err(ApiError::Validation(
                "Administrators cannot change their own status".to_string(),
            ));
        }

        let result = sqlx::query("UPDATE account SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(self.clock.now())
            .bind(account_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Account not found".to_string()));
        }

        if status != AccountStatus::Active {
            self.sessions.revoke_all_for_account(account_id).await?;
        }

        tracing::info!(account_id, status = %status, admin_id = actor.account_id, "account status changed");

        self.get_account(account_id).await
    }

    /// Active counselors currently taking appointments
    pub async fn list_counselors(&self) -> ApiResult<Vec<CounselorSummary>> {
        let rows = sqlx::query(
            "SELECT a.name, c.account_id, c.title, c.specialty, c.introduction, c.department,
                    c.office_location, c.available
             FROM counselor_profile c
             JOIN account a ON a.id = c.account_id
             WHERE a.status = 'active' AND c.available = 1
             ORDER BY a.id",
        )
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> ApiResult<CounselorSummary> {
                let profile = CounselorProfile::from_row(row)?;
                Ok(CounselorSummary {
                    id: profile.account_id,
                    name: row.try_get("name")?,
                    profile,
                })
            })
            .collect()
    }

    /// Create the configured administrator if no account holds the name
    pub async fn ensure_admin(&self, username: &str, password: &str) -> ApiResult<bool> {
        if let Some(existing) = self.find_by_username(username).await? {
            if existing.role != Role::Admin {
                tracing::warn!(
                    username,
                    role = %existing.role,
                    "bootstrap admin name is held by a non-admin account"
                );
            }
            return Ok(false);
        }

        let password_hash = self.vault.hash_blocking(password.to_string()).await?;
        let account = self
            .insert_with_profile(username, &password_hash, None, Role::Admin)
            .await?;

        tracing::info!(account_id = account.id, username, "bootstrap admin created");

        Ok(true)
    }

    /// Get account by id
    pub async fn get_account(&self, account_id: i64) -> ApiResult<Account> {
        let query = format!("SELECT {} FROM account WHERE id = ?1", Account::COLUMNS);

        let row = sqlx::query(&query)
            .bind(account_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        Account::from_row(&row)
    }

    pub async fn count_accounts(&self) -> ApiResult<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&self.db)
            .await?)
    }

    async fn find_by_username(&self, username: &str) -> ApiResult<Option<Account>> {
        let query = format!("SELECT {} FROM account WHERE username = ?1", Account::COLUMNS);

        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.db)
            .await?;

        row.as_ref().map(Account::from_row).transpose()
    }

    async fn username_exists(&self, username: &str) -> ApiResult<bool> {
        Ok(
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM account WHERE username = ?1)")
                .bind(username)
                .fetch_one(&self.db)
                .await?,
        )
    }

    /// Insert the account and its role profile in one transaction
    async fn insert_with_profile(
        &self,
        username: &str,
        password_hash: &str,
        name: Option<String>,
        role: Role,
    ) -> ApiResult<Account> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        let id = sqlx::query(
            "INSERT INTO account (username, password_hash, name, role, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(&name)
        .bind(role.as_str())
        .bind(AccountStatus::Active.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                ApiError::Conflict(format!("Username {} already taken", username))
            } else {
                ApiError::Database(e)
            }
        })?
        .last_insert_rowid();

        let profile = match role {
            Role::Student => Some("INSERT INTO student_profile (account_id) VALUES (?1)"),
            Role::Counselor => {
                Some("INSERT INTO counselor_profile (account_id, available) VALUES (?1, 1)")
            }
            Role::Admin => None,
        };

        if let Some(statement) = profile {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, role = %role, "failed to create role profile");
                    ApiError::Internal("Failed to create role profile".to_string())
                })?;
        }

        tx.commit().await?;

        Ok(Account {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            name,
            email: None,
            phone: None,
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    async fn role_profile(&self, account: &Account) -> ApiResult<Option<RoleProfile>> {
        let profile = match account.role {
            Role::Student => sqlx::query(
                "SELECT account_id, student_number, major, class_name, grade, dormitory
                 FROM student_profile WHERE account_id = ?1",
            )
            .bind(account.id)
            .fetch_optional(&self.db)
            .await?
            .as_ref()
            .map(StudentProfile::from_row)
            .transpose()?
            .map(RoleProfile::Student),
            Role::Counselor => sqlx::query(
                "SELECT account_id, title, specialty, introduction, department, office_location, available
                 FROM counselor_profile WHERE account_id = ?1",
            )
            .bind(account.id)
            .fetch_optional(&self.db)
            .await?
            .as_ref()
            .map(CounselorProfile::from_row)
            .transpose()?
            .map(RoleProfile::Counselor),
            Role::Admin => None,
        };

        Ok(profile)
    }

    async fn start_session(&self, account: &Account, client: &ClientInfo) -> ApiResult<AuthResponse> {
        let issued = self.tokens.issue(account.id, account.role)?;

        self.sessions
            .record(account.id, &issued.token, issued.expires_at, client)
            .await?;

        Ok(AuthResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            user: AccountSummary::from(account),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{password, AuthGate},
        clock::ManualClock,
        db::{create_memory_pool, run_migrations},
    };
    use chrono::{Duration, Utc};

    struct Fixture {
        db: SqlitePool,
        manager: AccountManager,
        gate: AuthGate,
        tokens: Arc<TokenIssuer>,
    }

    async fn fixture() -> Fixture {
        let db = create_memory_pool().await.unwrap();
        run_migrations(&db).await.unwrap();

        let clock: SharedClock = Arc::new(ManualClock::new(Utc::now()));
        let sessions = Arc::new(SessionStore::new(db.clone(), clock.clone()));
        let tokens = Arc::new(TokenIssuer::new(
            "test-secret-key-for-testing-only-0123456789",
            Duration::hours(24),
            clock.clone(),
        ));

        Fixture {
            db: db.clone(),
            manager: AccountManager::new(
                db,
                sessions.clone(),
                tokens.clone(),
                PasswordVault::new(password::MIN_COST),
                clock,
            ),
            gate: AuthGate::new(sessions, tokens.clone()),
            tokens,
        }
    }

    fn register_req(username: &str, role: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: "secret123".to_string(),
            name: Some("Test User".to_string()),
            role: role.map(str::to_string),
        }
    }

    fn login_req(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let f = fixture().await;
        let client = ClientInfo::default();

        let registered = f
            .manager
            .register(register_req("alice", None), &client)
            .await
            .unwrap();
        assert_eq!(registered.user.role, Role::Student);

        let login = f
            .manager
            .login(login_req("alice", "secret123"), &client)
            .await
            .unwrap();

        let claims = f.tokens.validate(&login.token).unwrap();
        assert_eq!(claims.account_id().unwrap(), registered.user.id);
        assert_eq!(claims.role, Role::Student);

        let ctx = f.gate.authenticate(Some(&login.token)).await.unwrap();
        assert_eq!(ctx.account_id, registered.user.id);
    }

    #[tokio::test]
    async fn test_register_creates_role_profile() {
        let f = fixture().await;
        let registered = f
            .manager
            .register(register_req("carol", Some("counselor")), &ClientInfo::default())
            .await
            .unwrap();

        let profile = f.manager.profile(registered.user.id).await.unwrap();
        assert!(matches!(
            profile.profile,
            Some(RoleProfile::Counselor(CounselorProfile { available: true, .. }))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let f = fixture().await;
        let client = ClientInfo::default();
        f.manager.register(register_req("alice", None), &client).await.unwrap();
        let before = f.manager.count_accounts().await.unwrap();

        assert!(matches!(
            f.manager.register(register_req("alice", None), &client).await,
            Err(ApiError::Conflict(_))
        ));
        assert_eq!(f.manager.count_accounts().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_registration_rejects_admin_and_bad_input() {
        let f = fixture().await;
        let client = ClientInfo::default();

        assert!(matches!(
            f.manager.register(register_req("mallory", Some("admin")), &client).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            f.manager.register(register_req("eve", Some("wizard")), &client).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            f.manager.register(register_req("ab", None), &client).await,
            Err(ApiError::Validation(_))
        ));

        let mut short = register_req("trent", None);
        short.password = "12345".to_string();
        assert!(matches!(
            f.manager.register(short, &client).await,
            Err(ApiError::Validation(_))
        ));

        let mut wide = register_req("peggy", None);
        wide.password = "心理健康".repeat(7);
        assert!(matches!(
            f.manager.register(wide, &client).await,
            Err(ApiError::Validation(_))
        ));

        assert_eq!(f.manager.count_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_profile_insert_rolls_back_account() {
        let f = fixture().await;
        sqlx::query(
            "CREATE TRIGGER reject_student_profile BEFORE INSERT ON student_profile
             BEGIN SELECT RAISE(ABORT, 'profile rejected'); END",
        )
        .execute(&f.db)
        .await
        .unwrap();

        let before = f.manager.count_accounts().await.unwrap();

        assert!(matches!(
            f.manager.register(register_req("alice", None), &ClientInfo::default()).await,
            Err(ApiError::Internal(_))
        ));
        assert_eq!(f.manager.count_accounts().await.unwrap(), before);
        assert!(f.manager.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures() {
        let f = fixture().await;
        let client = ClientInfo::default();
        f.manager.register(register_req("alice", None), &client).await.unwrap();

        assert!(matches!(
            f.manager.login(login_req("alice", "wrong-pass"), &client).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            f.manager.login(login_req("nobody", "secret123"), &client).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_blocked_account_loses_sessions_and_cannot_login() {
        let f = fixture().await;
        let client = ClientInfo::default();
        f.manager.ensure_admin("root", "rootpass").await.unwrap();
        let admin = f.manager.login(login_req("root", "rootpass"), &client).await.unwrap();
        let admin_ctx = f.gate.authenticate(Some(&admin.token)).await.unwrap();

        let alice = f.manager.register(register_req("alice", None), &client).await.unwrap();

        let updated = f
            .manager
            .set_status(&admin_ctx, alice.user.id, AccountStatus::Blocked)
            .await
            .unwrap();
        assert_eq!(updated.status, AccountStatus::Blocked);

        assert!(matches!(
            f.gate.authenticate(Some(&alice.token)).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            f.manager.login(login_req("alice", "secret123"), &client).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            f.manager
                .set_status(&admin_ctx, admin_ctx.account_id, AccountStatus::Inactive)
                .await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_keeps_current_session_only() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let first = f.manager.register(register_req("alice", None), &client).await.unwrap();
        let second = f.manager.login(login_req("alice", "secret123"), &client).await.unwrap();
        let ctx = f.gate.authenticate(Some(&first.token)).await.unwrap();

        assert!(matches!(
            f.manager
                .change_password(
                    &ctx,
                    ChangePasswordRequest {
                        old_password: "not-it".to_string(),
                        new_password: "newsecret".to_string(),
                    },
                )
                .await,
            Err(ApiError::Validation(_))
        ));

        f.manager
            .change_password(
                &ctx,
                ChangePasswordRequest {
                    old_password: "secret123".to_string(),
                    new_password: "newsecret".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(f.gate.authenticate(Some(&first.token)).await.is_ok());
        assert!(f.gate.authenticate(Some(&second.token)).await.is_err());
        assert!(f.manager.login(login_req("alice", "newsecret"), &client).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_and_counselor_directory() {
        let f = fixture().await;
        let client = ClientInfo::default();
        let carol = f
            .manager
            .register(register_req("carol", Some("counselor")), &client)
            .await
            .unwrap();
        let dave = f
            .manager
            .register(register_req("dave", Some("counselor")), &client)
            .await
            .unwrap();

        let updated = f
            .manager
            .update_profile(
                carol.user.id,
                UpdateProfileRequest {
                    email: Some("carol@example.edu".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.account.email.as_deref(), Some("carol@example.edu"));
        assert_eq!(updated.account.name.as_deref(), Some("Test User"));

        assert!(matches!(
            f.manager
                .update_profile(
                    dave.user.id,
                    UpdateProfileRequest {
                        email: Some("carol@example.edu".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(ApiError::Conflict(_))
        ));

        assert_eq!(f.manager.list_counselors().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let f = fixture().await;
        assert!(f.manager.ensure_admin("root", "rootpass").await.unwrap());
        assert!(!f.manager.ensure_admin("root", "rootpass").await.unwrap());

        let admins = f
            .manager
            .list_accounts(&ListAccountsQuery {
                role: Some(Role::Admin),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(admins.len(), 1);
    }
}
