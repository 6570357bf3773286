/// API routes and handlers
pub mod appointments;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod users;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(auth::routes(ctx))
        .merge(users::routes(ctx))
        .merge(appointments::routes(ctx))
}
