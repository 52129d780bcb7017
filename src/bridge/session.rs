// src/bridge/session.rs
// Per-session request, correlation fields, lifecycle state and final report

use std::fmt;

use uuid::Uuid;

use super::error::BridgeError;
use crate::auth::Principal;

pub const DEFAULT_TARGET_HOST: &str = "127.0.0.1";
pub const DEFAULT_SSH_USER: &str = "root";

/// Query-time parameters of a terminal request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub host: String,
    /// `None` means "use the port registered for the host" (22 unless set).
    pub port: Option<u16>,
    pub user: String,
    /// The SSH login was not given and fell back to `root`.
    pub user_defaulted: bool,
}

impl SessionRequest {
    pub fn new(host: Option<&str>, port: Option<u16>, user: Option<&str>) -> Self {
        let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
        let user = non_blank(user);

        Self {
            host: non_blank(host).unwrap_or_else(|| DEFAULT_TARGET_HOST.to_string()),
            port,
            user_defaulted: user.is_none(),
            user: user.unwrap_or_else(|| DEFAULT_SSH_USER.to_string()),
        }
    }
}

/// Where the browser-side connection came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
}

/// Everything known about a session before the handshake
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub principal: Principal,
    pub request: SessionRequest,
    pub client: ClientInfo,
}

impl SessionContext {
    pub fn new(principal: Principal, request: SessionRequest, client: ClientInfo) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            principal,
            request,
            client,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    AwaitingUpgrade,
    AwaitingHandshake,
    ResolvingTarget,
    Authorizing,
    Dialing,
    Streaming,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::AwaitingUpgrade => "awaiting_upgrade",
            SessionState::AwaitingHandshake => "awaiting_handshake",
            SessionState::ResolvingTarget => "resolving_target",
            SessionState::Authorizing => "authorizing",
            SessionState::Dialing => "dialing",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Streamed, then one side closed cleanly
    Completed,
    /// Streamed, then a read/write error ended it (still a normal end)
    Disconnected(BridgeError),
    /// Never reached streaming
    Failed(BridgeError),
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    /// Last state before closing began
    pub reached: SessionState,
    /// Client -> shell
    pub bytes_in: u64,
    /// Shell -> client
    pub bytes_out: u64,
}

impl SessionReport {
    pub fn error(&self) -> Option<&BridgeError> {
        match &self.outcome {
            SessionOutcome::Completed => None,
            SessionOutcome::Disconnected(e) | SessionOutcome::Failed(e) => Some(e),
        }
    }

    pub fn streamed(&self) -> bool {
        self.reached == SessionState::Streaming
    }
}
