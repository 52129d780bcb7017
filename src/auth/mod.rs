// src/auth/mod.rs
// Identity adapter: verified token -> Principal

pub mod jwt;
pub mod middleware;
pub mod principal;

pub use jwt::{Claims, JwtKeys};
pub use middleware::{bearer_token, require_permission, require_principal};
pub use principal::Principal;
