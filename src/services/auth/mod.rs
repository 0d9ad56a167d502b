pub mod credential;
pub mod factory;
pub mod gate;
pub mod principal;
pub mod session_jwt;

pub use factory::build_auth_gate;
pub use gate::{AuthGate, GateVariant, Rejection};
pub use principal::{ConfirmedPrincipal, PgPrincipalStore, PrincipalResolver, PrincipalStore, Role};
pub use session_jwt::{SessionVerifier, VerifiedClaims};
