// src/config/server.rs
// Server, database, auth and logging configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::helpers::{env_or, env_parsed_or};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env_or("TERMGATE_HOST", "127.0.0.1"),
            port: env_parsed_or("TERMGATE_PORT", 8080)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env_or("DATABASE_URL", "sqlite://termgate.db"),
            max_connections: env_parsed_or("TERMGATE_SQLITE_MAX_CONNECTIONS", 8)?,
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `termgate=debug,tower_http=info`
    pub level: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_or("TERMGATE_LOG_LEVEL", "info"),
        }
    }
}

const DEV_JWT_SECRET: &str = "termgate-dev-secret-change-me";

/// Token verification settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    /// Lifetime of tokens minted by `termgate issue-token`
    pub token_ttl_hours: i64,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = match std::env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => DEV_JWT_SECRET.to_string(),
        };

        Ok(Self {
            jwt_secret,
            token_ttl_hours: env_parsed_or("TERMGATE_TOKEN_TTL_HOURS", 12)?,
        })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}
