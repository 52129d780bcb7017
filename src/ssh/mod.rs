// src/ssh/mod.rs
// Outbound SSH leg: dial, PTY, shell, byte pipes

pub mod client;
pub mod host_key;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::credential::AuthMethod;

pub use client::SshDialer;
pub use host_key::{AcceptAnyHostKey, HostKeyVerifier, PinnedHostKeys};

/// Where to dial and as whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl DialTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub cols: u32,
    pub rows: u32,
}

/// Byte pipes to a running remote shell.
///
/// `output` carries stdout and stderr interleaved and ends when the remote
/// side closes. Dropping `stdin` sends EOF.
#[derive(Debug)]
pub struct ShellIo {
    pub stdin: mpsc::Sender<Vec<u8>>,
    pub output: mpsc::Receiver<Vec<u8>>,
}

#[derive(Debug, thiserror::Error)]
pub enum DialError {
    #[error("ssh dial error: {0}")]
    Connect(String),

    #[error("ssh dial error: authentication failed: {0}")]
    Authentication(String),

    #[error("ssh session error: {0}")]
    Session(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("pty error: {0}")]
    Pty(String),

    #[error("shell error: {0}")]
    Start(String),
}

/// Opens authenticated SSH connections. One call, one connection; nothing is
/// pooled or shared between sessions.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, target: &DialTarget, auth: AuthMethod) -> Result<Box<dyn ShellConnection>, DialError>;
}

/// An authenticated connection with one session channel.
#[async_trait]
pub trait ShellConnection: Send {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), ShellError>;

    /// Runs `command` as the channel's program. May be retried with another
    /// command after a refusal.
    async fn start_shell(&mut self, command: &str) -> Result<ShellIo, ShellError>;

    /// Closes the channel and the underlying connection. Idempotent.
    async fn close(&mut self);
}
