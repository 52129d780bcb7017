// src/api/http/audit.rs
// Audit trail listing for the caller's organization

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::error::{ApiResult, db_error};
use crate::audit::{AuditPage, AuditQuery, store::DEFAULT_PAGE_SIZE};
use crate::auth::{Principal, require_permission};
use crate::rbac::Permission;
use crate::state::AppState;

/// Raw query string; unparseable numbers fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct AuditListParams {
    pub limit: Option<String>,
    pub after_id: Option<String>,
    pub q: Option<String>,
}

impl AuditListParams {
    pub fn into_query(self, org_id: i64) -> AuditQuery {
        let mut query = AuditQuery::new(org_id);
        query.limit = self
            .limit
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        query.after_id = self
            .after_id
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|v| *v > 0);
        query.search = self.q.filter(|q| !q.trim().is_empty());
        query
    }
}

/// GET /api/v1/audit
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(params): Query<AuditListParams>,
) -> ApiResult<Json<AuditPage>> {
    require_permission(&state, &principal, Permission::AuditRead).await?;

    let query = params.into_query(principal.org_id);
    debug!(org_id = query.org_id, limit = query.limit, after_id = ?query.after_id, "Listing audit logs");

    let page = state
        .audit_log
        .list(&query)
        .await
        .map_err(|e| db_error("audit listing", e))?;

    Ok(Json(page))
}
