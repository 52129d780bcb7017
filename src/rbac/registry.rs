// src/rbac/registry.rs
// Startup check that code and data agree on permission keys

use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{Permission, RbacError, RbacResult};

/// Fails when a key the code checks has no row in `permissions` (a grant for
/// it could never exist). Extra keys in the table only warn.
pub async fn verify_permission_registry(pool: &SqlitePool) -> RbacResult<()> {
    let stored: Vec<String> = sqlx::query_scalar("SELECT key FROM permissions")
        .fetch_all(pool)
        .await?;
    let stored: HashSet<String> = stored.into_iter().map(|k| k.to_lowercase()).collect();

    let registered: HashSet<String> = Permission::ALL
        .iter()
        .map(|p| p.key().to_string())
        .collect();

    let mut missing: Vec<String> = registered.difference(&stored).cloned().collect();
    missing.sort();
    if !missing.is_empty() {
        return Err(RbacError::MissingPermissions(missing));
    }

    let mut unknown: Vec<&String> = stored.difference(&registered).collect();
    unknown.sort();
    for key in unknown {
        warn!("Permission '{}' exists in the store but no code checks it", key);
    }

    info!("Permission registry verified ({} keys)", registered.len());
    Ok(())
}
