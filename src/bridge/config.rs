// src/bridge/config.rs
// Immutable per-process bridge settings, built once and handed to SessionBridge::new

use std::time::Duration;

pub const DEFAULT_COLS: u32 = 120;
pub const DEFAULT_ROWS: u32 = 32;
pub const DEFAULT_TERM: &str = "xterm-256color";
pub const DEFAULT_LOGIN_SHELL: &str = "/bin/bash -l";
pub const DEFAULT_FALLBACK_SHELL: &str = "/bin/sh";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Terminal size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalGeometry {
    pub cols: u32,
    pub rows: u32,
}

impl Default for TerminalGeometry {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

/// Which browser origins may open a terminal socket.
///
/// There is deliberately no `Default`: every deployment picks one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every origin. Only sensible behind another origin filter.
    AllowAny,
    /// Origin must match one of these (scheme + host + optional port).
    AllowList(Vec<String>),
    /// Origin authority must equal the request's `Host` header.
    SameHost,
}

impl OriginPolicy {
    /// Requests without an `Origin` header come from non-browser clients and
    /// are not subject to cross-site hijacking, so they pass every policy.
    pub fn permits(&self, origin: Option<&str>, host: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        let origin = normalize_origin(origin);

        match self {
            OriginPolicy::AllowAny => true,
            OriginPolicy::AllowList(allowed) => {
                allowed.iter().any(|a| normalize_origin(a) == origin)
            }
            OriginPolicy::SameHost => match host {
                Some(host) => origin_authority(&origin) == host.trim().to_ascii_lowercase(),
                None => false,
            },
        }
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

fn origin_authority(origin: &str) -> &str {
    origin
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(origin)
}

/// WebSocket upgrade parameters
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    pub max_message_size: usize,
    pub origin_policy: OriginPolicy,
}

impl TransportConfig {
    pub fn new(origin_policy: OriginPolicy) -> Self {
        Self {
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            max_message_size: 1 << 20,
            origin_policy,
        }
    }
}

/// Everything a bridge session needs to know that is not per-request.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub transport: TransportConfig,
    /// Upper bound on waiting for the `auth` control frame
    pub handshake_timeout: Duration,
    /// Upper bound on TCP connect + SSH handshake + authentication
    pub dial_timeout: Duration,
    pub default_geometry: TerminalGeometry,
    pub term: String,
    pub login_shell: String,
    pub fallback_shell: String,
    /// Capacity of the per-session channels between transport and SSH pump
    pub channel_capacity: usize,
}

impl BridgeConfig {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            handshake_timeout: Duration::from_secs(30),
            dial_timeout: Duration::from_secs(10),
            default_geometry: TerminalGeometry::default(),
            term: DEFAULT_TERM.to_string(),
            login_shell: DEFAULT_LOGIN_SHELL.to_string(),
            fallback_shell: DEFAULT_FALLBACK_SHELL.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Zero or missing dimensions fall back to the configured default.
    pub fn resolve_geometry(&self, cols: Option<i64>, rows: Option<i64>) -> TerminalGeometry {
        let pick = |value: Option<i64>, default: u32| {
            value
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .unwrap_or(default)
        };

        TerminalGeometry {
            cols: pick(cols, self.default_geometry.cols),
            rows: pick(rows, self.default_geometry.rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BridgeConfig {
        BridgeConfig::new(TransportConfig::new(OriginPolicy::SameHost))
    }

    #[test]
    fn defaults_match_terminal_contract() {
        let cfg = config();
        assert_eq!(cfg.handshake_timeout, Duration::from_secs(30));
        assert_eq!(cfg.dial_timeout, Duration::from_secs(10));
        assert_eq!(cfg.term, "xterm-256color");
        assert_eq!(cfg.transport.read_buffer_size, 8192);
        assert_eq!(cfg.transport.write_buffer_size, 8192);
    }

    #[test]
    fn zero_or_missing_geometry_uses_default() {
        let cfg = config();
        assert_eq!(
            cfg.resolve_geometry(Some(0), Some(0)),
            TerminalGeometry { cols: 120, rows: 32 }
        );
        assert_eq!(
            cfg.resolve_geometry(None, Some(50)),
            TerminalGeometry { cols: 120, rows: 50 }
        );
        assert_eq!(
            cfg.resolve_geometry(Some(-4), Some(200)),
            TerminalGeometry { cols: 120, rows: 200 }
        );
    }

    #[test]
    fn allow_list_matches_normalized_origin() {
        let policy = OriginPolicy::AllowList(vec!["https://Console.example.com/".into()]);
        assert!(policy.permits(Some("https://console.example.com"), None));
        assert!(!policy.permits(Some("https://evil.example.com"), None));
        assert!(policy.permits(None, None));
    }

    #[test]
    fn same_host_compares_authority() {
        let policy = OriginPolicy::SameHost;
        assert!(policy.permits(Some("http://127.0.0.1:8080"), Some("127.0.0.1:8080")));
        assert!(!policy.permits(Some("http://127.0.0.1:9999"), Some("127.0.0.1:8080")));
        assert!(!policy.permits(Some("http://127.0.0.1:8080"), None));
    }

    #[test]
    fn allow_any_accepts_everything() {
        assert!(OriginPolicy::AllowAny.permits(Some("null"), None));
    }
}
