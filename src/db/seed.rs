// src/db/seed.rs
// Idempotent first-run data: default org, system roles, permission catalogue, admin user

use anyhow::{Context, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::rbac::Permission;

pub const DEFAULT_ORG_SLUG: &str = "default";
pub const ADMIN_EMAIL: &str = "admin@example.com";

const DEVOPS_PERMISSIONS: &[Permission] = &[
    Permission::ResourcesRead,
    Permission::ResourcesGenerateToken,
    Permission::ResourcesWrite,
    Permission::ResourcesConnect,
    Permission::AuditRead,
    Permission::RolesRead,
    Permission::UsersRead,
];

const READONLY_PERMISSIONS: &[Permission] = &[
    Permission::UsersRead,
    Permission::RolesRead,
    Permission::ResourcesRead,
    Permission::AuditRead,
];

/// Ids created (or found) by the seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub org_id: i64,
    pub admin_user_id: i64,
    pub admin_role_id: i64,
}

/// Safe to run on every start; existing rows are left alone.
pub async fn seed_defaults(pool: &SqlitePool) -> Result<SeedSummary> {
    let mut tx = pool.begin().await.context("Failed to start seed transaction")?;

    sqlx::query("INSERT OR IGNORE INTO organizations (name, slug) VALUES (?, ?)")
        .bind("Default Organization")
        .bind(DEFAULT_ORG_SLUG)
        .execute(&mut *tx)
        .await?;
    let org_id: i64 = sqlx::query_scalar("SELECT id FROM organizations WHERE slug = ?")
        .bind(DEFAULT_ORG_SLUG)
        .fetch_one(&mut *tx)
        .await?;

    let admin_role = ensure_role(&mut tx, org_id, "Administrator", "admin").await?;
    let devops_role = ensure_role(&mut tx, org_id, "DevOps", "devops").await?;
    let readonly_role = ensure_role(&mut tx, org_id, "ReadOnly", "readonly").await?;

    for permission in Permission::ALL {
        sqlx::query("INSERT OR IGNORE INTO permissions (key, description) VALUES (?, ?)")
            .bind(permission.key().as_str())
            .bind(permission.description())
            .execute(&mut *tx)
            .await?;
        grant(&mut tx, admin_role, permission).await?;
    }
    for permission in DEVOPS_PERMISSIONS {
        grant(&mut tx, devops_role, *permission).await?;
    }
    for permission in READONLY_PERMISSIONS {
        grant(&mut tx, readonly_role, *permission).await?;
    }

    sqlx::query("INSERT OR IGNORE INTO users (org_id, name, email) VALUES (?, ?, ?)")
        .bind(org_id)
        .bind("Admin User")
        .bind(ADMIN_EMAIL)
        .execute(&mut *tx)
        .await?;
    let admin_user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE org_id = ? AND email = ?")
        .bind(org_id)
        .bind(ADMIN_EMAIL)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id, org_id) VALUES (?, ?, ?)")
        .bind(admin_user_id)
        .bind(admin_role)
        .bind(org_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await.context("Failed to commit seed")?;

    info!(
        org = DEFAULT_ORG_SLUG,
        admin = ADMIN_EMAIL,
        permissions = Permission::ALL.len(),
        "Seed OK (roles: admin, devops, readonly)"
    );

    Ok(SeedSummary {
        org_id,
        admin_user_id,
        admin_role_id: admin_role,
    })
}

async fn ensure_role(tx: &mut Transaction<'_, Sqlite>, org_id: i64, name: &str, slug: &str) -> Result<i64> {
    sqlx::query("INSERT OR IGNORE INTO roles (org_id, name, slug, is_system) VALUES (?, ?, ?, 1)")
        .bind(org_id)
        .bind(name)
        .bind(slug)
        .execute(&mut **tx)
        .await?;

    let id = sqlx::query_scalar("SELECT id FROM roles WHERE org_id = ? AND slug = ?")
        .bind(org_id)
        .bind(slug)
        .fetch_one(&mut **tx)
        .await?;
    Ok(id)
}

async fn grant(tx: &mut Transaction<'_, Sqlite>, role_id: i64, permission: Permission) -> Result<()> {
    sqlx::query(
        "INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
         SELECT ?, id FROM permissions WHERE key = ?",
    )
    .bind(role_id)
    .bind(permission.key().as_str())
    .execute(&mut **tx)
    .await?;
    Ok(())
}
