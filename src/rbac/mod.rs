// src/rbac/mod.rs
// Authorization gate: may principal P do A within organization O?

pub mod permission;
pub mod registry;
pub mod sqlite;

use async_trait::async_trait;
use tracing::warn;

use crate::auth::Principal;

pub use permission::{Permission, PermissionKey};
pub use registry::verify_permission_registry;
pub use sqlite::SqliteGate;

#[derive(Debug, thiserror::Error)]
pub enum RbacError {
    #[error("invalid permission key: {0:?}")]
    InvalidKey(String),

    #[error("unknown permission key: {0}")]
    UnknownPermission(String),

    #[error("registered permissions missing from store: {}", .0.join(", "))]
    MissingPermissions(Vec<String>),

    #[error("permission lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

pub type RbacResult<T> = Result<T, RbacError>;

/// `Ok(false)` means "no role grants it". `Err` means the question could not
/// be answered; callers must treat it as a denial.
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    async fn can(&self, principal: &Principal, org_id: i64, permission: Permission) -> RbacResult<bool>;
}

/// Collapses the gate's answer into allow/deny, failing closed.
pub async fn permits(
    gate: &dyn AuthorizationGate,
    principal: &Principal,
    org_id: i64,
    permission: Permission,
) -> bool {
    match gate.can(principal, org_id, permission).await {
        Ok(allowed) => allowed,
        Err(e) => {
            warn!(
                user_id = principal.user_id,
                org_id,
                permission = %permission,
                error = %e,
                "authorization check failed; denying"
            );
            false
        }
    }
}
