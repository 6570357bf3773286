/// Account endpoints: own profile, password, counselor directory and admin views
use crate::{
    account::{
        ChangePasswordRequest, CounselorSummary, ListAccountsQuery, ProfileResponse,
        SetStatusRequest, UpdateProfileRequest,
    },
    auth::{self, enforce_roles, AuthContext, Role, RoleGate},
    context::AppContext,
    db::account::Account,
    error::ApiResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ListAccountsResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListCounselorsResponse {
    pub counselors: Vec<CounselorSummary>,
}

/// Build account routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let own = Router::new()
        .route("/api/v1/users/profile", get(get_profile).put(update_profile))
        .route("/api/v1/users/change-password", post(change_password))
        .route("/api/v1/counselors", get(list_counselors));

    let admin = Router::new()
        .route("/api/v1/users", get(list_accounts))
        .route("/api/v1/users/:id", get(get_account))
        .route("/api/v1/users/:id/status", put(set_account_status))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::require(&[Role::Admin]),
            enforce_roles,
        ));

    own.merge(admin)
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth::authenticate))
}

async fn get_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(ctx.account_manager.profile(auth.account_id).await?))
}

async fn update_profile(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = ctx
        .account_manager
        .update_profile(auth.account_id, req)
        .await?;

    Ok(Json(profile))
}

async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    ctx.account_manager.change_password(&auth, req).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_counselors(State(ctx): State<AppContext>) -> ApiResult<Json<ListCounselorsResponse>> {
    let counselors = ctx.account_manager.list_counselors().await?;

    Ok(Json(ListCounselorsResponse { counselors }))
}

/// List accounts (admin only)
async fn list_accounts(
    State(ctx): State<AppContext>,
    Query(filter): Query<ListAccountsQuery>,
) -> ApiResult<Json<ListAccountsResponse>> {
    let accounts = ctx.account_manager.list_accounts(&filter).await?;

    Ok(Json(ListAccountsResponse { accounts }))
}

/// Get one account (admin only)
async fn get_account(
    State(ctx): State<AppContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProfileResponse>> {
    Ok(Json(ctx.account_manager.profile(id).await?))
}

/// Activate, deactivate or block an account (admin only)
async fn set_account_status(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(id): Path<i64>,
    Json(req): Json<SetStatusRequest>,
) -> ApiResult<Json<Account>> {
    let account = ctx
        .account_manager
        .set_status(&auth, id, req.status)
        .await?;

    Ok(Json(account))
}
