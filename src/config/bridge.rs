// src/config/bridge.rs
// Terminal bridge settings: timeouts, shell, WebSocket upgrade and host-key policy

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{info, warn};

use super::helpers::{env_list, env_or, env_parsed_or};
use crate::bridge::{BridgeConfig, OriginPolicy, TerminalGeometry, TransportConfig};
use crate::ssh::{AcceptAnyHostKey, HostKeyVerifier, PinnedHostKeys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostKeyPolicy {
    AcceptAny,
    Pinned,
}

impl std::str::FromStr for HostKeyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accept-any" | "accept_any" | "insecure" => Ok(Self::AcceptAny),
            "pinned" | "pin" => Ok(Self::Pinned),
            other => Err(format!("unknown host key policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub handshake_timeout_secs: u64,
    pub dial_timeout_secs: u64,
    pub default_cols: u32,
    pub default_rows: u32,
    pub term: String,
    pub login_shell: String,
    pub fallback_shell: String,
    pub ws_read_buffer: usize,
    pub ws_write_buffer: usize,
    pub ws_max_message: usize,
    /// Chunks buffered per direction between the WebSocket and the SSH channel
    pub ssh_channel_capacity: usize,
    pub origin_policy: OriginPolicy,
    pub host_key_policy: HostKeyPolicy,
    pub known_hosts: Option<PathBuf>,
}

impl BridgeSettings {
    pub fn from_env() -> Result<Self> {
        let host_key_policy: HostKeyPolicy = env_or("TERMGATE_HOST_KEY_POLICY", "accept-any")
            .parse()
            .map_err(anyhow::Error::msg)?;

        let known_hosts = std::env::var("TERMGATE_KNOWN_HOSTS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            handshake_timeout_secs: env_parsed_or("TERMGATE_HANDSHAKE_TIMEOUT_SECS", 30)?,
            dial_timeout_secs: env_parsed_or("TERMGATE_DIAL_TIMEOUT_SECS", 10)?,
            default_cols: env_parsed_or("TERMGATE_DEFAULT_COLS", crate::bridge::config::DEFAULT_COLS)?,
            default_rows: env_parsed_or("TERMGATE_DEFAULT_ROWS", crate::bridge::config::DEFAULT_ROWS)?,
            term: env_or("TERMGATE_TERM", crate::bridge::config::DEFAULT_TERM),
            login_shell: env_or("TERMGATE_LOGIN_SHELL", crate::bridge::config::DEFAULT_LOGIN_SHELL),
            fallback_shell: env_or(
                "TERMGATE_FALLBACK_SHELL",
                crate::bridge::config::DEFAULT_FALLBACK_SHELL,
            ),
            ws_read_buffer: env_parsed_or("TERMGATE_WS_READ_BUFFER", 8192)?,
            ws_write_buffer: env_parsed_or("TERMGATE_WS_WRITE_BUFFER", 8192)?,
            ws_max_message: env_parsed_or("TERMGATE_WS_MAX_MESSAGE", 1 << 20)?,
            ssh_channel_capacity: env_parsed_or(
                "TERMGATE_SSH_CHANNEL_CAPACITY",
                crate::bridge::config::DEFAULT_CHANNEL_CAPACITY,
            )?,
            origin_policy: origin_policy_from(env_list("TERMGATE_ALLOWED_ORIGINS")),
            host_key_policy,
            known_hosts,
        })
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let mut transport = TransportConfig::new(self.origin_policy.clone());
        transport.read_buffer_size = self.ws_read_buffer;
        transport.write_buffer_size = self.ws_write_buffer;
        transport.max_message_size = self.ws_max_message;

        let mut config = BridgeConfig::new(transport)
            .with_handshake_timeout(Duration::from_secs(self.handshake_timeout_secs))
            .with_dial_timeout(Duration::from_secs(self.dial_timeout_secs));
        config.default_geometry = TerminalGeometry {
            cols: self.default_cols,
            rows: self.default_rows,
        };
        config.term = self.term.clone();
        config.login_shell = self.login_shell.clone();
        config.fallback_shell = self.fallback_shell.clone();
        config.channel_capacity = self.ssh_channel_capacity.max(1);
        config
    }

    pub fn host_key_verifier(&self) -> Result<Arc<dyn HostKeyVerifier>> {
        match self.host_key_policy {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    "SSH host keys are NOT verified (TERMGATE_HOST_KEY_POLICY=accept-any); \
                     set TERMGATE_HOST_KEY_POLICY=pinned with TERMGATE_KNOWN_HOSTS to enforce"
                );
                Ok(Arc::new(AcceptAnyHostKey))
            }
            HostKeyPolicy::Pinned => {
                let Some(path) = &self.known_hosts else {
                    bail!("TERMGATE_HOST_KEY_POLICY=pinned requires TERMGATE_KNOWN_HOSTS");
                };
                let pins = PinnedHostKeys::from_file(path)?;
                info!("Loaded {} pinned SSH host key entries", pins.len());
                Ok(Arc::new(pins))
            }
        }
    }
}

/// `*` allows any origin, an explicit list is an allow-list, nothing means
/// same-host only.
fn origin_policy_from(origins: Vec<String>) -> OriginPolicy {
    if origins.iter().any(|o| o == "*") {
        OriginPolicy::AllowAny
    } else if origins.is_empty() {
        OriginPolicy::SameHost
    } else {
        OriginPolicy::AllowList(origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_policy_selection() {
        assert_eq!(origin_policy_from(vec![]), OriginPolicy::SameHost);
        assert_eq!(origin_policy_from(vec!["*".into()]), OriginPolicy::AllowAny);
        assert_eq!(
            origin_policy_from(vec!["https://a.example".into()]),
            OriginPolicy::AllowList(vec!["https://a.example".into()])
        );
    }

    #[test]
    fn host_key_policy_parses_aliases() {
        assert_eq!("pinned".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::Pinned));
        assert_eq!("Accept-Any".parse::<HostKeyPolicy>(), Ok(HostKeyPolicy::AcceptAny));
        assert!("tofu".parse::<HostKeyPolicy>().is_err());
    }

    #[test]
    fn pinned_policy_requires_known_hosts() {
        let settings = BridgeSettings {
            handshake_timeout_secs: 30,
            dial_timeout_secs: 10,
            default_cols: 120,
            default_rows: 32,
            term: "xterm-256color".into(),
            login_shell: "/bin/bash -l".into(),
            fallback_shell: "/bin/sh".into(),
            ws_read_buffer: 8192,
            ws_write_buffer: 8192,
            ws_max_message: 1 << 20,
            ssh_channel_capacity: 16,
            origin_policy: OriginPolicy::SameHost,
            host_key_policy: HostKeyPolicy::Pinned,
            known_hosts: None,
        };
        assert!(settings.host_key_verifier().is_err());

        let config = settings.bridge_config();
        assert_eq!(config.dial_timeout, Duration::from_secs(10));
        assert_eq!(config.default_geometry, TerminalGeometry { cols: 120, rows: 32 });
        assert_eq!(config.channel_capacity, 16);
    }

    #[test]
    fn channel_capacity_is_read_from_env() {
        unsafe { std::env::set_var("TERMGATE_SSH_CHANNEL_CAPACITY", "8") };
        let settings = BridgeSettings::from_env().unwrap();
        unsafe { std::env::remove_var("TERMGATE_SSH_CHANNEL_CAPACITY") };

        assert_eq!(settings.ssh_channel_capacity, 8);
        assert_eq!(settings.bridge_config().channel_capacity, 8);
    }
}
