/// Mindwell - student mental-health service backend
///
/// Accounts with student, counselor and admin roles, counseling appointment
/// scheduling, and the token-based session layer that guards them.

pub mod account;
pub mod api;
pub mod appointment;
pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod jobs;
pub mod rate_limit;
pub mod server;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
