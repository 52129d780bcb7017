// src/bridge/error.rs

use crate::rbac::Permission;

/// Why a bridge session ended early. Every variant is terminal for the
/// session; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("no auth message within {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("invalid auth message: {0}")]
    InvalidHandshake(String),

    #[error("resource not found for host {host}")]
    TargetNotFound { host: String },

    #[error("resource lookup failed for host {host}: {reason}")]
    TargetLookup { host: String, reason: String },

    #[error("no private key found for host {host}")]
    MissingCredential { host: String },

    #[error("invalid private key for host {host}: {reason}")]
    MalformedCredential { host: String, reason: String },

    #[error("permission denied: {permission} required")]
    AuthorizationDenied { permission: Permission },

    #[error("{0}")]
    DialFailure(String),

    #[error("{0}")]
    PtyAllocationFailure(String),

    #[error("{0}")]
    ShellStartFailure(String),

    #[error("stream error: {0}")]
    StreamIo(String),
}

impl BridgeError {
    /// The single text frame the client sees before the socket closes.
    pub fn client_message(&self) -> String {
        match self {
            BridgeError::HandshakeTimeout(_) | BridgeError::InvalidHandshake(_) => {
                "auth error\n".to_string()
            }
            other => format!("{}\n", other),
        }
    }

    /// Setup failures are reported to the client; stream errors are an
    /// ordinary way for a session to end.
    pub fn is_setup_failure(&self) -> bool {
        !matches!(self, BridgeError::StreamIo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn handshake_failures_say_auth_error() {
        assert_eq!(
            BridgeError::HandshakeTimeout(Duration::from_secs(30)).client_message(),
            "auth error\n"
        );
        assert_eq!(
            BridgeError::InvalidHandshake("op".into()).client_message(),
            "auth error\n"
        );
    }

    #[test]
    fn not_found_names_host() {
        let err = BridgeError::TargetNotFound {
            host: "10.0.0.9".into(),
        };
        assert_eq!(err.client_message(), "resource not found for host 10.0.0.9\n");
        assert!(err.is_setup_failure());
        assert!(!BridgeError::StreamIo("reset".into()).is_setup_failure());
    }

    #[test]
    fn denial_names_permission() {
        let err = BridgeError::AuthorizationDenied {
            permission: Permission::ResourcesConnect,
        };
        assert_eq!(err.client_message(), "permission denied: resources:connect required\n");
    }
}
