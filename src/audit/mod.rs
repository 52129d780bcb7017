// src/audit/mod.rs
// Append-only audit trail for remote sessions

pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

pub use store::{AuditLogEntry, AuditPage, AuditQuery, SqliteAuditLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    #[serde(rename = "session.connect")]
    SessionConnect,
    #[serde(rename = "session.disconnect")]
    SessionDisconnect,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::SessionConnect => "session.connect",
            AuditAction::SessionDisconnect => "session.disconnect",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry. Connect and disconnect records of a session
/// differ only in `action` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub org_id: i64,
    pub user_id: i64,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Option<i64>,
    pub target: String,
    pub session_id: Option<Uuid>,
    pub ip: String,
    pub user_agent: String,
    pub initiator_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Same correlation fields, different action/time.
    pub fn correlates_with(&self, other: &AuditRecord) -> bool {
        self.org_id == other.org_id
            && self.user_id == other.user_id
            && self.resource_type == other.resource_type
            && self.resource_id == other.resource_id
            && self.target == other.target
            && self.session_id == other.session_id
            && self.ip == other.ip
            && self.user_agent == other.user_agent
            && self.initiator_name == other.initiator_name
            && self.metadata == other.metadata
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("audit metadata encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Destination for audit records. Must accept concurrent writers.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> AuditResult<()>;
}

/// Best-effort front for an `AuditSink`: failures reach the operator log
/// and never the caller.
#[derive(Clone)]
pub struct AuditEmitter {
    sink: Arc<dyn AuditSink>,
}

impl AuditEmitter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn emit(&self, record: &AuditRecord) {
        if let Err(e) = self.sink.record(record).await {
            error!(
                action = %record.action,
                session_id = ?record.session_id,
                target = %record.target,
                error = %e,
                "failed to persist audit record"
            );
        }
    }
}
