// src/ssh/client.rs
// russh-backed Dialer: one TCP connection, one session channel, a reader and a writer task

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, AuthResult, Handle};
use russh::keys::{HashAlg, PublicKey};
use russh::{Channel, ChannelMsg, ChannelReadHalf, ChannelWriteHalf, Disconnect, Pty};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{DialError, DialTarget, Dialer, HostKeyVerifier, PtyRequest, ShellConnection, ShellError, ShellIo};
use crate::bridge::config::DEFAULT_CHANNEL_CAPACITY;
use crate::credential::AuthMethod;

const TERMINAL_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// How long `close` waits for the pump tasks to stop.
const PUMP_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct SshDialer {
    config: Arc<client::Config>,
    host_keys: Arc<dyn HostKeyVerifier>,
    channel_capacity: usize,
}

impl SshDialer {
    pub fn new(host_keys: Arc<dyn HostKeyVerifier>) -> Self {
        let config = client::Config {
            nodelay: true,
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            host_keys,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }
}

#[async_trait]
impl Dialer for SshDialer {
    async fn dial(&self, target: &DialTarget, auth: AuthMethod) -> Result<Box<dyn ShellConnection>, DialError> {
        let handler = ClientHandler {
            host: target.host.clone(),
            port: target.port,
            host_keys: self.host_keys.clone(),
        };

        debug!(target = %target.address(), user = %target.user, "connecting");
        let mut handle = client::connect(
            self.config.clone(),
            (target.host.as_str(), target.port),
            handler,
        )
        .await
        .map_err(|e| DialError::Connect(e.to_string()))?;

        let result = handle
            .authenticate_publickey(target.user.clone(), auth.into_russh())
            .await
            .map_err(|e| DialError::Authentication(e.to_string()))?;

        if let AuthResult::Failure { remaining_methods, .. } = result {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(DialError::Authentication(format!(
                "key rejected for user {} (server offers {:?})",
                target.user, remaining_methods
            )));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| DialError::Session(e.to_string()))?;

        info!(target = %target.address(), user = %target.user, "SSH session channel open");

        Ok(Box::new(RusshConnection {
            label: target.address(),
            handle,
            channel: Some(channel),
            early_output: Vec::new(),
            pump: None,
            channel_capacity: self.channel_capacity,
            closed: false,
        }))
    }
}

struct ClientHandler {
    host: String,
    port: u16,
    host_keys: Arc<dyn HostKeyVerifier>,
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        Ok(self.host_keys.verify(&self.host, self.port, &fingerprint))
    }
}

struct Pump {
    stop: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
    channel: Arc<ChannelWriteHalf<client::Msg>>,
}

struct RusshConnection {
    label: String,
    handle: Handle<ClientHandler>,
    /// Split between the pump tasks once the shell runs
    channel: Option<Channel<client::Msg>>,
    /// Output that raced ahead of a request reply
    early_output: Vec<Vec<u8>>,
    pump: Option<Pump>,
    channel_capacity: usize,
    closed: bool,
}

/// Waits for the reply to a `want_reply` channel request.
async fn await_reply(
    channel: &mut Channel<client::Msg>,
    early_output: &mut Vec<Vec<u8>>,
) -> Result<bool, String> {
    loop {
        match channel.wait().await {
            Some(ChannelMsg::Success) => return Ok(true),
            Some(ChannelMsg::Failure) => return Ok(false),
            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                early_output.push(data.to_vec());
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                return Err("channel closed by server".to_string());
            }
            Some(_) => {}
        }
    }
}

#[async_trait]
impl ShellConnection for RusshConnection {
    async fn request_pty(&mut self, pty: &PtyRequest) -> Result<(), ShellError> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| ShellError::Pty("channel already running a program".to_string()))?;

        channel
            .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, TERMINAL_MODES)
            .await
            .map_err(|e| ShellError::Pty(e.to_string()))?;

        match await_reply(channel, &mut self.early_output).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ShellError::Pty("server refused pseudo-terminal".to_string())),
            Err(e) => Err(ShellError::Pty(e)),
        }
    }

    async fn start_shell(&mut self, command: &str) -> Result<ShellIo, ShellError> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| ShellError::Start("channel already running a program".to_string()))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| ShellError::Start(e.to_string()))?;

        match await_reply(channel, &mut self.early_output).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(ShellError::Start(format!("server refused to run `{}`", command)));
            }
            Err(e) => return Err(ShellError::Start(e)),
        }

        let channel = self
            .channel
            .take()
            .ok_or_else(|| ShellError::Start("channel vanished".to_string()))?;
        let early = std::mem::take(&mut self.early_output);
        let (io, pump) = spawn_pump(channel, early, self.channel_capacity, self.label.clone());
        self.pump = Some(pump);

        debug!(target = %self.label, command, "remote shell started");
        Ok(io)
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(pump) = self.pump.take() {
            pump.stop.cancel();
            let joined = tokio::time::timeout(PUMP_SHUTDOWN_GRACE, async {
                let _ = tokio::join!(pump.reader, pump.writer);
            })
            .await;
            if joined.is_err() {
                warn!(target = %self.label, "SSH pump did not stop in time");
            }
            let _ = pump.channel.close().await;
        }

        if let Some(channel) = self.channel.take() {
            let _ = channel.close().await;
        }

        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
        {
            debug!(target = %self.label, error = %e, "disconnect after close");
        }
    }
}

/// Splits the channel and runs each direction on its own task. The reader
/// must keep draining while the writer waits on the send window, otherwise
/// the window adjust that would release the writer is never processed.
fn spawn_pump(
    channel: Channel<client::Msg>,
    early_output: Vec<Vec<u8>>,
    capacity: usize,
    label: String,
) -> (ShellIo, Pump) {
    let (stdin_tx, stdin_rx) = mpsc::channel::<Vec<u8>>(capacity);
    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(capacity);
    let stop = CancellationToken::new();

    let (read_half, write_half) = channel.split();
    let write_half = Arc::new(write_half);

    let reader = tokio::spawn(pump_output(read_half, early_output, output_tx, stop.clone(), label.clone()));
    let writer = tokio::spawn(pump_input(write_half.clone(), stdin_rx, stop.clone(), label));

    (
        ShellIo {
            stdin: stdin_tx,
            output: output_rx,
        },
        Pump {
            stop,
            reader,
            writer,
            channel: write_half,
        },
    )
}

/// Remote -> `output`. Dropping `output_tx` on return tells the bridge the
/// remote side is gone.
async fn pump_output(
    mut read_half: ChannelReadHalf,
    early_output: Vec<Vec<u8>>,
    output_tx: mpsc::Sender<Vec<u8>>,
    stop: CancellationToken,
    label: String,
) {
    for chunk in early_output {
        if output_tx.send(chunk).await.is_err() {
            return;
        }
    }

    loop {
        let msg = tokio::select! {
            _ = stop.cancelled() => break,
            msg = read_half.wait() => msg,
        };

        match msg {
            Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    sent = output_tx.send(data.to_vec()) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                debug!(target = %label, exit_status, "remote program exited");
            }
            Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                debug!(target = %label, "remote side closed the channel");
                break;
            }
            Some(_) => {}
        }
    }
}

/// `stdin` -> remote. A closed `stdin` becomes EOF on the channel.
async fn pump_input(
    write_half: Arc<ChannelWriteHalf<client::Msg>>,
    mut stdin_rx: mpsc::Receiver<Vec<u8>>,
    stop: CancellationToken,
    label: String,
) {
    loop {
        let input = tokio::select! {
            _ = stop.cancelled() => break,
            input = stdin_rx.recv() => input,
        };

        let Some(bytes) = input else {
            let _ = write_half.eof().await;
            break;
        };

        tokio::select! {
            _ = stop.cancelled() => break,
            written = write_half.data(&bytes[..]) => {
                if let Err(e) = written {
                    debug!(target = %label, error = %e, "write to remote failed");
                    break;
                }
            }
        }
    }
    debug!(target = %label, "SSH input pump finished");
}
