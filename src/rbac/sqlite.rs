// src/rbac/sqlite.rs

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{AuthorizationGate, Permission, RbacResult};
use crate::auth::Principal;

/// Walks user_roles -> roles (org scoped) -> role_permissions -> permissions.
#[derive(Clone)]
pub struct SqliteGate {
    pool: SqlitePool,
}

impl SqliteGate {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthorizationGate for SqliteGate {
    async fn can(&self, principal: &Principal, org_id: i64, permission: Permission) -> RbacResult<bool> {
        let key = permission.key();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*)
             FROM user_roles ur
             JOIN roles r ON r.id = ur.role_id AND r.org_id = ?
             JOIN role_permissions rp ON rp.role_id = r.id
             JOIN permissions p ON p.id = rp.permission_id
             WHERE ur.user_id = ? AND ur.org_id = ? AND p.key = ?",
        )
        .bind(org_id)
        .bind(principal.user_id)
        .bind(org_id)
        .bind(key.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}
