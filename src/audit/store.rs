// src/audit/store.rs
// SQLite-backed audit log: append path for the bridge, paged read path for the API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use super::{AuditRecord, AuditResult, AuditSink};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Stored audit entry as returned by the listing API
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub org_id: i64,
    pub user_id: i64,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub target: String,
    pub session_id: Option<String>,
    pub ip: String,
    pub user_agent: String,
    pub initiator_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, SqliteRow> for AuditLogEntry {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let metadata: String = row.try_get("metadata")?;
        let metadata = serde_json::from_str(&metadata).map_err(|e| sqlx::Error::ColumnDecode {
            index: "metadata".to_string(),
            source: Box::new(e),
        })?;
        let created_at: i64 = row.try_get("created_at")?;

        Ok(Self {
            id: row.try_get("id")?,
            org_id: row.try_get("org_id")?,
            user_id: row.try_get("user_id")?,
            action: row.try_get("action")?,
            resource_type: row.try_get("resource_type")?,
            resource_id: row.try_get("resource_id")?,
            target: row.try_get("target")?,
            session_id: row.try_get("session_id")?,
            ip: row.try_get("ip")?,
            user_agent: row.try_get("user_agent")?,
            initiator_name: row.try_get("initiator_name")?,
            metadata,
            created_at: DateTime::from_timestamp_millis(created_at).unwrap_or_default(),
        })
    }
}

/// Newest-first page request, scoped to one organization
#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub org_id: i64,
    pub limit: u32,
    /// Only entries with an id strictly below this
    pub after_id: Option<i64>,
    /// Substring match over initiator, action, resource type and IP
    pub search: Option<String>,
}

impl AuditQuery {
    pub fn new(org_id: i64) -> Self {
        Self {
            org_id,
            limit: DEFAULT_PAGE_SIZE,
            after_id: None,
            search: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub logs: Vec<AuditLogEntry>,
    /// Pass back as `after_id` to get the next page
    pub next_cursor: Option<i64>,
}

const SELECT_COLUMNS: &str = "SELECT id, org_id, user_id, action, resource_type, resource_id, target,
        session_id, ip, user_agent, initiator_name, metadata, created_at
 FROM audit_logs";

#[derive(Clone)]
pub struct SqliteAuditLog {
    pool: SqlitePool,
}

impl SqliteAuditLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &AuditQuery) -> AuditResult<AuditPage> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let sql = format!(
            "{SELECT_COLUMNS}
             WHERE org_id = ?
               AND (? IS NULL OR id < ?)
               AND (? IS NULL OR initiator_name LIKE ? OR action LIKE ? OR resource_type LIKE ? OR ip LIKE ?)
             ORDER BY id DESC
             LIMIT ?"
        );

        let mut logs: Vec<AuditLogEntry> = sqlx::query_as(&sql)
            .bind(query.org_id)
            .bind(query.after_id)
            .bind(query.after_id)
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(search.as_deref())
            .bind(i64::from(limit) + 1)
            .fetch_all(&self.pool)
            .await?;

        // One extra row tells us whether another page exists.
        let next_cursor = if logs.len() > limit as usize {
            logs.truncate(limit as usize);
            logs.last().map(|entry| entry.id)
        } else {
            None
        };

        Ok(AuditPage { logs, next_cursor })
    }

    /// Every entry for one bridge session, oldest first.
    pub async fn for_session(&self, session_id: &str) -> AuditResult<Vec<AuditLogEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE session_id = ? ORDER BY id ASC");
        let entries = sqlx::query_as(&sql)
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditLog {
    async fn record(&self, record: &AuditRecord) -> AuditResult<()> {
        let metadata = serde_json::to_string(&record.metadata)?;

        sqlx::query(
            "INSERT INTO audit_logs
             (org_id, user_id, action, resource_type, resource_id, target, session_id,
              ip, user_agent, initiator_name, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.org_id)
        .bind(record.user_id)
        .bind(record.action.as_str())
        .bind(&record.resource_type)
        .bind(record.resource_id)
        .bind(&record.target)
        .bind(record.session_id.map(|id| id.to_string()))
        .bind(&record.ip)
        .bind(&record.user_agent)
        .bind(&record.initiator_name)
        .bind(metadata)
        .bind(record.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
