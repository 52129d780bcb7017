// src/config/mod.rs
// Central configuration for termgate, loaded once in main and passed down

pub mod bridge;
pub mod helpers;
pub mod server;

use anyhow::Result;

pub use bridge::{BridgeSettings, HostKeyPolicy};
pub use server::{AuthConfig, DatabaseConfig, LoggingConfig, ServerConfig};

/// Composes all domain configs
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    pub bridge: BridgeSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        // Don't fail if .env doesn't exist (production)
        dotenv::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            logging: LoggingConfig::from_env(),
            bridge: BridgeSettings::from_env()?,
        })
    }
}
