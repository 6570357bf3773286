/// Authentication and authorization
///
/// Password hashing, token minting, persisted sessions and the request gates
/// built on top of them.
pub mod gate;
pub mod password;
pub mod roles;
pub mod session;
pub mod token;

pub use gate::{authenticate, AuthContext, AuthGate, BearerToken};
pub use password::PasswordVault;
pub use roles::{enforce_roles, Role, RoleGate};
pub use session::{ClientInfo, SessionLookup, SessionStore};
pub use token::{IssuedToken, TokenClaims, TokenError, TokenIssuer};
