// src/bridge/mod.rs
// Session bridge: browser terminal frames <-> SSH shell bytes
//
// One `run` call owns one session end to end:
//   handshake -> resolve target -> authorize -> credentials -> dial -> pty/shell
//   -> connect audit -> two forwarding tasks -> close both legs -> disconnect audit

pub mod config;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod session;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::audit::{AuditAction, AuditEmitter, AuditRecord, AuditSink};
use crate::auth::Principal;
use crate::credential::{CredentialError, CredentialResolver};
use crate::directory::{ResourceDirectory, TargetDescriptor};
use crate::rbac::{self, AuthorizationGate, Permission};
use crate::ssh::{DialTarget, Dialer, PtyRequest, ShellConnection, ShellIo};

pub use config::{BridgeConfig, OriginPolicy, TerminalGeometry, TransportConfig};
pub use error::BridgeError;
pub use frame::Frame;
pub use handshake::AuthMessage;
pub use session::{
    ClientInfo, SessionContext, SessionOutcome, SessionReport, SessionRequest, SessionState,
};

/// Permission needed to open a remote terminal
pub const SESSION_PERMISSION: Permission = Permission::ResourcesConnect;

pub const AUDIT_RESOURCE_TYPE: &str = "ssh";

pub struct SessionBridge {
    config: BridgeConfig,
    directory: Arc<dyn ResourceDirectory>,
    gate: Arc<dyn AuthorizationGate>,
    resolver: CredentialResolver,
    dialer: Arc<dyn Dialer>,
    audit: AuditEmitter,
}

/// A live shell plus what is needed to audit and tear it down
struct Established {
    connection: Box<dyn ShellConnection>,
    io: ShellIo,
    target: TargetDescriptor,
    dial: DialTarget,
}

/// How one forwarding direction stopped
#[derive(Debug)]
enum DirectionEnd {
    PeerClosed,
    Cancelled,
    Error(String),
}

impl SessionBridge {
    pub fn new(
        config: BridgeConfig,
        directory: Arc<dyn ResourceDirectory>,
        gate: Arc<dyn AuthorizationGate>,
        dialer: Arc<dyn Dialer>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            config,
            directory,
            gate,
            resolver: CredentialResolver::new(),
            dialer,
            audit: AuditEmitter::new(audit),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Pre-upgrade check in the caller's own organization. A `false` here
    /// must stop the transport upgrade.
    pub async fn authorize_upgrade(&self, principal: &Principal) -> bool {
        rbac::permits(self.gate.as_ref(), principal, principal.org_id, SESSION_PERMISSION).await
    }

    /// Drives one session over an already upgraded transport and returns once
    /// both legs are closed.
    pub async fn run<S, R, E>(&self, ctx: SessionContext, sink: S, stream: R) -> SessionReport
    where
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send + 'static,
        R: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let span = info_span!(
            "ssh_session",
            session_id = %ctx.session_id,
            user_id = ctx.principal.user_id,
            host = %ctx.request.host,
            ssh_user = %ctx.request.user,
        );
        self.run_session(ctx, sink, stream).instrument(span).await
    }

    async fn run_session<S, R, E>(&self, ctx: SessionContext, mut sink: S, mut stream: R) -> SessionReport
    where
        S: Sink<Frame> + Unpin + Send + 'static,
        S::Error: fmt::Display + Send + 'static,
        R: Stream<Item = Result<Frame, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let mut state = SessionState::AwaitingHandshake;

        let established = match self.establish(&ctx, &mut stream, &mut state).await {
            Ok(established) => established,
            Err(err) => {
                info!(state = %state, error = %err, "session setup failed");
                debug!("state {} -> {}", state, SessionState::Closing);
                if let Err(e) = sink.send(Frame::Text(err.client_message())).await {
                    debug!("could not deliver diagnostic: {}", e);
                }
                let _ = sink.close().await;
                return SessionReport {
                    session_id: ctx.session_id,
                    outcome: SessionOutcome::Failed(err),
                    reached: state,
                    bytes_in: 0,
                    bytes_out: 0,
                };
            }
        };

        let Established {
            mut connection,
            io,
            target,
            dial,
        } = established;

        let connected_at = Utc::now();
        self.audit
            .emit(&audit_record(&ctx, &target, &dial, AuditAction::SessionConnect, connected_at))
            .await;

        advance(&mut state, SessionState::Streaming);
        info!(target = %dial.address(), "session streaming");

        let cancel = CancellationToken::new();
        let ShellIo { stdin, output } = io;
        let outbound = tokio::spawn(forward_output(sink, output, cancel.clone()));
        let inbound = tokio::spawn(forward_input(stream, stdin, cancel.clone()));
        let (outbound, inbound) = tokio::join!(outbound, inbound);

        advance(&mut state, SessionState::Closing);
        connection.close().await;

        let (sink, bytes_out, out_end) = match outbound {
            Ok((sink, bytes, end)) => (Some(sink), bytes, end),
            Err(e) => (None, 0, DirectionEnd::Error(format!("output task failed: {}", e))),
        };
        let (bytes_in, in_end) = match inbound {
            Ok(result) => result,
            Err(e) => (0, DirectionEnd::Error(format!("input task failed: {}", e))),
        };

        let disconnected_at = strictly_after(connected_at, Utc::now());
        self.audit
            .emit(&audit_record(&ctx, &target, &dial, AuditAction::SessionDisconnect, disconnected_at))
            .await;

        if let Some(mut sink) = sink {
            let _ = sink.close().await;
        }
        debug!("state {} -> {}", state, SessionState::Closed);

        let outcome = match (out_end, in_end) {
            (DirectionEnd::Error(e), _) | (_, DirectionEnd::Error(e)) => {
                debug!(error = %e, "stream ended with I/O error");
                SessionOutcome::Disconnected(BridgeError::StreamIo(e))
            }
            _ => SessionOutcome::Completed,
        };

        info!(bytes_in, bytes_out, "session closed");
        SessionReport {
            session_id: ctx.session_id,
            outcome,
            reached: SessionState::Streaming,
            bytes_in,
            bytes_out,
        }
    }

    async fn establish<R, E>(
        &self,
        ctx: &SessionContext,
        stream: &mut R,
        state: &mut SessionState,
    ) -> Result<Established, BridgeError>
    where
        R: Stream<Item = Result<Frame, E>> + Unpin,
        E: fmt::Display,
    {
        let geometry = self.await_handshake(stream).await?;

        advance(state, SessionState::ResolvingTarget);
        let host = &ctx.request.host;
        let target = self
            .directory
            .lookup_by_host(host)
            .await
            .map_err(|e| BridgeError::TargetLookup {
                host: host.clone(),
                reason: e.to_string(),
            })?
            .ok_or_else(|| BridgeError::TargetNotFound { host: host.clone() })?;

        // Authorized against the organization owning the target.
        advance(state, SessionState::Authorizing);
        if !rbac::permits(self.gate.as_ref(), &ctx.principal, target.org_id, SESSION_PERMISSION).await {
            return Err(BridgeError::AuthorizationDenied {
                permission: SESSION_PERMISSION,
            });
        }

        let auth = self.resolver.resolve(&target).map_err(|e| match e {
            CredentialError::Missing { host } => BridgeError::MissingCredential { host },
            CredentialError::Malformed { host, reason } => {
                BridgeError::MalformedCredential { host, reason }
            }
        })?;

        advance(state, SessionState::Dialing);
        let dial = DialTarget {
            host: host.clone(),
            port: ctx.request.port.unwrap_or(target.port),
            user: ctx.request.user.clone(),
        };
        if ctx.request.user_defaulted {
            warn!("no SSH login given; defaulting to {}", dial.user);
        }

        let limit = self.config.dial_timeout;
        let mut connection = match tokio::time::timeout(limit, self.dialer.dial(&dial, auth)).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => return Err(BridgeError::DialFailure(e.to_string())),
            Err(_) => {
                return Err(BridgeError::DialFailure(format!(
                    "ssh dial error: timed out after {}s",
                    limit.as_secs_f32()
                )));
            }
        };

        match self.start_terminal(connection.as_mut(), geometry).await {
            Ok(io) => Ok(Established {
                connection,
                io,
                target,
                dial,
            }),
            Err(e) => {
                connection.close().await;
                Err(e)
            }
        }
    }

    async fn await_handshake<R, E>(&self, stream: &mut R) -> Result<TerminalGeometry, BridgeError>
    where
        R: Stream<Item = Result<Frame, E>> + Unpin,
        E: fmt::Display,
    {
        let limit = self.config.handshake_timeout;
        let frame = match tokio::time::timeout(limit, stream.next()).await {
            Err(_) => return Err(BridgeError::HandshakeTimeout(limit)),
            Ok(None) => {
                return Err(BridgeError::InvalidHandshake(
                    "connection closed before auth".to_string(),
                ));
            }
            Ok(Some(Err(e))) => return Err(BridgeError::InvalidHandshake(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        let auth = handshake::parse_auth_frame(frame)?;
        Ok(self.config.resolve_geometry(auth.cols, auth.rows))
    }

    async fn start_terminal(
        &self,
        connection: &mut dyn ShellConnection,
        geometry: TerminalGeometry,
    ) -> Result<ShellIo, BridgeError> {
        let limit = self.config.dial_timeout;
        let pty = PtyRequest {
            term: self.config.term.clone(),
            cols: geometry.cols,
            rows: geometry.rows,
        };

        match tokio::time::timeout(limit, connection.request_pty(&pty)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BridgeError::PtyAllocationFailure(e.to_string())),
            Err(_) => {
                return Err(BridgeError::PtyAllocationFailure(
                    "pty error: no reply from server".to_string(),
                ));
            }
        }
        debug!(cols = pty.cols, rows = pty.rows, term = %pty.term, "pty allocated");

        let login = &self.config.login_shell;
        match tokio::time::timeout(limit, connection.start_shell(login)).await {
            Ok(Ok(io)) => return Ok(io),
            Ok(Err(e)) => warn!(shell = %login, error = %e, "login shell unavailable; trying fallback"),
            Err(_) => warn!(shell = %login, "login shell start timed out; trying fallback"),
        }

        let fallback = &self.config.fallback_shell;
        match tokio::time::timeout(limit, connection.start_shell(fallback)).await {
            Ok(Ok(io)) => Ok(io),
            Ok(Err(e)) => Err(BridgeError::ShellStartFailure(e.to_string())),
            Err(_) => Err(BridgeError::ShellStartFailure(format!(
                "shell error: `{}` did not start",
                fallback
            ))),
        }
    }
}

fn advance(state: &mut SessionState, next: SessionState) {
    debug!("state {} -> {}", state, next);
    *state = next;
}

/// Disconnect must sort after connect even when the clock has not moved
/// (or moved backwards) in between.
fn strictly_after(earlier: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = earlier + chrono::Duration::milliseconds(1);
    if now < floor { floor } else { now }
}

fn audit_record(
    ctx: &SessionContext,
    target: &TargetDescriptor,
    dial: &DialTarget,
    action: AuditAction,
    at: DateTime<Utc>,
) -> AuditRecord {
    AuditRecord {
        org_id: target.org_id,
        user_id: ctx.principal.user_id,
        action,
        resource_type: AUDIT_RESOURCE_TYPE.to_string(),
        resource_id: Some(target.resource_id),
        target: dial.host.clone(),
        session_id: Some(ctx.session_id),
        ip: ctx.client.ip.clone(),
        user_agent: ctx.client.user_agent.clone(),
        initiator_name: ctx.principal.name.clone(),
        metadata: json!({
            "ssh_user": dial.user,
            "host": dial.host,
            "port": dial.port,
            "initiator": ctx.principal.name,
            "initiator_email": ctx.principal.email,
            "session_id": ctx.session_id.to_string(),
        }),
        created_at: at,
    }
}

/// Shell output -> client, as binary frames.
async fn forward_output<S>(
    mut sink: S,
    mut output: mpsc::Receiver<Vec<u8>>,
    cancel: CancellationToken,
) -> (S, u64, DirectionEnd)
where
    S: Sink<Frame> + Unpin,
    S::Error: fmt::Display,
{
    let mut bytes = 0u64;
    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break DirectionEnd::Cancelled,
            chunk = output.recv() => match chunk {
                Some(chunk) => {
                    let len = chunk.len() as u64;
                    tokio::select! {
                        _ = cancel.cancelled() => break DirectionEnd::Cancelled,
                        sent = sink.send(Frame::Binary(chunk)) => {
                            if let Err(e) = sent {
                                break DirectionEnd::Error(e.to_string());
                            }
                            bytes += len;
                        }
                    }
                }
                None => break DirectionEnd::PeerClosed,
            },
        }
    };

    debug!(?end, bytes, "output direction stopped");
    cancel.cancel();
    (sink, bytes, end)
}

/// Client frames -> shell stdin, verbatim. Dropping `stdin` on return
/// signals EOF to the pump.
async fn forward_input<R, E>(
    mut stream: R,
    stdin: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
) -> (u64, DirectionEnd)
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: fmt::Display,
{
    let mut bytes = 0u64;
    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => break DirectionEnd::Cancelled,
            frame = stream.next() => match frame {
                None | Some(Ok(Frame::Close)) => break DirectionEnd::PeerClosed,
                Some(Err(e)) => break DirectionEnd::Error(e.to_string()),
                Some(Ok(frame)) => {
                    let Some(payload) = frame.into_payload() else { continue };
                    if payload.is_empty() {
                        continue;
                    }
                    let len = payload.len() as u64;
                    tokio::select! {
                        _ = cancel.cancelled() => break DirectionEnd::Cancelled,
                        sent = stdin.send(payload) => {
                            if sent.is_err() {
                                break DirectionEnd::PeerClosed;
                            }
                            bytes += len;
                        }
                    }
                }
            },
        }
    };

    debug!(?end, bytes, "input direction stopped");
    cancel.cancel();
    (bytes, end)
}
