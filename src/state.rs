// src/state.rs
// Shared application state handed to every handler

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::{
    audit::{AuditSink, SqliteAuditLog},
    auth::JwtKeys,
    bridge::{BridgeConfig, SessionBridge},
    config::AppConfig,
    directory::{ResourceDirectory, SqliteDirectory},
    rbac::{AuthorizationGate, SqliteGate},
    ssh::{Dialer, SshDialer},
};

#[derive(Clone)]
pub struct AppState {
    // -------- Storage --------
    pub sqlite_pool: SqlitePool,
    pub audit_log: SqliteAuditLog,

    // -------- Identity / RBAC --------
    pub jwt: JwtKeys,
    pub gate: Arc<dyn AuthorizationGate>,

    // -------- Terminal --------
    pub bridge: Arc<SessionBridge>,
}

impl AppState {
    /// Production wiring: SQLite-backed gate, directory and audit log, russh dialer.
    pub fn build(pool: SqlitePool, config: &AppConfig) -> Result<Self> {
        let host_keys = config.bridge.host_key_verifier()?;
        let bridge_config = config.bridge.bridge_config();
        let dialer = Arc::new(SshDialer::new(host_keys).with_channel_capacity(bridge_config.channel_capacity));

        info!(
            handshake_timeout = ?bridge_config.handshake_timeout,
            dial_timeout = ?bridge_config.dial_timeout,
            "Terminal bridge configured"
        );

        let audit_log = SqliteAuditLog::new(pool.clone());
        Ok(Self::from_parts(
            pool.clone(),
            JwtKeys::from_secret(&config.auth.jwt_secret),
            Arc::new(SqliteGate::new(pool.clone())),
            Arc::new(SqliteDirectory::new(pool)),
            dialer,
            audit_log,
            bridge_config,
        ))
    }

    /// Assembles state from explicit parts; tests swap in stub dialers here.
    pub fn from_parts(
        sqlite_pool: SqlitePool,
        jwt: JwtKeys,
        gate: Arc<dyn AuthorizationGate>,
        directory: Arc<dyn ResourceDirectory>,
        dialer: Arc<dyn Dialer>,
        audit_log: SqliteAuditLog,
        bridge_config: BridgeConfig,
    ) -> Self {
        let sink: Arc<dyn AuditSink> = Arc::new(audit_log.clone());
        let bridge = SessionBridge::new(bridge_config, directory, gate.clone(), dialer, sink);

        Self {
            sqlite_pool,
            audit_log,
            jwt,
            gate,
            bridge: Arc::new(bridge),
        }
    }
}
