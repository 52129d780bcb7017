// src/directory/mod.rs
// Resource directory: host identifier -> connection parameters + key material

use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

use crate::credential::CredentialMaterial;

/// Connection metadata for one registered host. Owned by the directory; the
/// bridge only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub resource_id: i64,
    pub org_id: i64,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credential: CredentialMaterial,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("resource {id} has invalid port {port}")]
    InvalidPort { id: i64, port: i64 },

    #[error("resource lookup failed: {0}")]
    Lookup(#[from] sqlx::Error),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// `Ok(None)` is the normal "not registered" answer.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    async fn lookup_by_host(&self, host: &str) -> DirectoryResult<Option<TargetDescriptor>>;
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    id: i64,
    org_id: i64,
    name: String,
    host: String,
    port: i64,
    private_key: Option<String>,
}

impl TryFrom<ResourceRow> for TargetDescriptor {
    type Error = DirectoryError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let port = u16::try_from(row.port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(DirectoryError::InvalidPort {
                id: row.id,
                port: row.port,
            })?;

        Ok(Self {
            resource_id: row.id,
            org_id: row.org_id,
            name: row.name,
            host: row.host,
            port,
            credential: CredentialMaterial::from(row.private_key),
        })
    }
}

#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceDirectory for SqliteDirectory {
    async fn lookup_by_host(&self, host: &str) -> DirectoryResult<Option<TargetDescriptor>> {
        // `resources.host` is UNIQUE, so at most one row matches.
        let row: Option<ResourceRow> = sqlx::query_as(
            "SELECT id, org_id, name, host, port, private_key
             FROM resources WHERE host = ?",
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TargetDescriptor::try_from).transpose()
    }
}
