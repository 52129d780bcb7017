// src/auth/middleware.rs
// Turns a bearer token (header or `token` cookie) into a Principal extension

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use super::jwt::Claims;
use super::principal::{Principal, UNKNOWN_DISPLAY_NAME};
use crate::api::error::{ApiError, ApiResult};
use crate::rbac::{self, Permission};
use crate::state::AppState;

pub async fn require_principal(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let claims = state.jwt.verify_token(&token).map_err(|e| {
        debug!("Rejected token: {}", e);
        ApiError::unauthorized("invalid or expired token")
    })?;

    let principal = load_principal(&state.sqlite_pool, &claims).await;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// `Authorization: Bearer <jwt>` first, then the `token` cookie, since
/// browsers cannot attach headers to WebSocket handshakes.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Display identity comes from the users table; a failed lookup still yields
/// a usable principal named "Unknown".
pub async fn load_principal(pool: &SqlitePool, claims: &Claims) -> Principal {
    let row: Result<Option<(String, String)>, sqlx::Error> =
        sqlx::query_as("SELECT name, email FROM users WHERE id = ?")
            .bind(claims.uid)
            .fetch_optional(pool)
            .await;

    match row {
        Ok(Some((name, email))) => Principal::new(claims.uid, claims.oid, name, email),
        Ok(None) => Principal::new(claims.uid, claims.oid, UNKNOWN_DISPLAY_NAME, claims.email.clone()),
        Err(e) => {
            warn!("User lookup failed for uid {}: {}", claims.uid, e);
            Principal::new(claims.uid, claims.oid, UNKNOWN_DISPLAY_NAME, claims.email.clone())
        }
    }
}

/// Route guard: deny (403) unless the gate positively allows.
pub async fn require_permission(
    state: &AppState,
    principal: &Principal,
    permission: Permission,
) -> ApiResult<()> {
    if rbac::permits(state.gate.as_ref(), principal, principal.org_id, permission).await {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("missing permission {}", permission)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_token_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=cookie"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=xyz"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("xyz"));

        let empty = HeaderMap::new();
        assert_eq!(bearer_token(&empty), None);
    }
}
