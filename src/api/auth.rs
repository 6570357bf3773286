/// Registration, login and logout endpoints
use crate::{
    account::{AuthResponse, LoginRequest, RegisterRequest},
    auth::{self, BearerToken, ClientInfo},
    context::AppContext,
    error::ApiResult,
    rate_limit::rate_limit_middleware,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::post,
    Extension, Json, Router,
};

/// Build authentication routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    let public = Router::new()
        .route("/api/v1/register", post(register))
        .route("/api/v1/login", post(login))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), rate_limit_middleware));

    let session = Router::new()
        .route("/api/v1/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth::authenticate));

    public.merge(session)
}

/// Register endpoint
async fn register(
    State(ctx): State<AppContext>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    tracing::debug!(username = %req.username, client_addr = %client.addr, "register request");

    let response = ctx.account_manager.register(req, &client).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Login endpoint
async fn login(
    State(ctx): State<AppContext>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let response = ctx.account_manager.login(req, &client).await?;

    Ok(Json(response))
}

/// Logout endpoint; revokes the presented token
async fn logout(
    State(ctx): State<AppContext>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> ApiResult<StatusCode> {
    ctx.account_manager.logout(&token).await?;

    Ok(StatusCode::NO_CONTENT)
}
