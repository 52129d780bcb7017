// src/api/ws/terminal.rs
// GET /api/v1/ws/ssh?host=&port=&user= : upgrades to a WebSocket and hands it to the session bridge

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        ConnectInfo, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt, future};
use serde::Deserialize;
use tracing::{info, warn};

use crate::api::error::{ApiError, invalid_param_error};
use crate::auth::Principal;
use crate::bridge::{ClientInfo, Frame, SESSION_PERMISSION, SessionContext, SessionOutcome, SessionRequest, SessionState};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TerminalQuery {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
}

pub async fn ws_ssh_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
    Query(query): Query<TerminalQuery>,
) -> Response {
    let transport = &state.bridge.config().transport;

    let origin = header_str(&headers, header::ORIGIN);
    if !transport.origin_policy.permits(origin, header_str(&headers, header::HOST)) {
        warn!(origin = ?origin, peer = %addr, state = %SessionState::AwaitingUpgrade, "Rejected terminal upgrade from disallowed origin");
        return ApiError::forbidden("origin not allowed").into_response();
    }

    if !state.bridge.authorize_upgrade(&principal).await {
        info!(
            user_id = principal.user_id,
            peer = %addr,
            state = %SessionState::AwaitingUpgrade,
            "Terminal upgrade denied"
        );
        return ApiError::forbidden(format!("missing permission {}", SESSION_PERMISSION)).into_response();
    }

    let port = match parse_port(query.port.as_deref()) {
        Ok(port) => port,
        Err(e) => return e.into_response(),
    };

    let request = SessionRequest::new(query.host.as_deref(), port, query.user.as_deref());
    let client = ClientInfo {
        ip: addr.ip().to_string(),
        user_agent: header_str(&headers, header::USER_AGENT).unwrap_or_default().to_string(),
    };
    let ctx = SessionContext::new(principal, request, client);

    info!(
        session_id = %ctx.session_id,
        user_id = ctx.principal.user_id,
        host = %ctx.request.host,
        peer = %addr,
        "Terminal upgrade accepted"
    );

    ws.read_buffer_size(transport.read_buffer_size)
        .write_buffer_size(transport.write_buffer_size)
        .max_message_size(transport.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, ctx))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, ctx: SessionContext) {
    let (sender, receiver) = socket.split();

    let sink = sender.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    // Ping/Pong are answered by the socket itself and never reach the shell.
    let stream = receiver.filter_map(|msg| {
        future::ready(match msg {
            Ok(msg) => to_frame(msg).map(Ok),
            Err(e) => Some(Err(e)),
        })
    });

    let report = state.bridge.run(ctx, sink, stream).await;
    match &report.outcome {
        SessionOutcome::Completed => info!(
            session_id = %report.session_id,
            bytes_in = report.bytes_in,
            bytes_out = report.bytes_out,
            "Terminal session finished"
        ),
        SessionOutcome::Disconnected(e) => info!(
            session_id = %report.session_id,
            bytes_in = report.bytes_in,
            bytes_out = report.bytes_out,
            "Terminal session ended: {}", e
        ),
        SessionOutcome::Failed(e) => warn!(
            session_id = %report.session_id,
            reached = %report.reached,
            "Terminal session failed: {}", e
        ),
    }
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Blank means "use the registered port".
fn parse_port(raw: Option<&str>) -> Result<Option<u16>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid_param_error("port", "must be 1-65535")),
        Ok(port) => Ok(Some(port)),
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
        Frame::Close => Message::Close(None),
    }
}

fn to_frame(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => Some(Frame::Text(text.as_str().to_string())),
        Message::Binary(bytes) => Some(Frame::Binary(bytes.to_vec())),
        Message::Close(_) => Some(Frame::Close),
        Message::Ping(_) | Message::Pong(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_parsing() {
        assert!(matches!(parse_port(None), Ok(None)));
        assert!(matches!(parse_port(Some(" ")), Ok(None)));
        assert!(matches!(parse_port(Some("2222")), Ok(Some(2222))));
        assert!(parse_port(Some("0")).is_err());
        assert!(parse_port(Some("70000")).is_err());
        assert!(parse_port(Some("ssh")).is_err());
    }

    #[test]
    fn control_frames_are_not_forwarded() {
        assert_eq!(to_frame(Message::Ping(Vec::new().into())), None);
        assert_eq!(to_frame(Message::Close(None)), Some(Frame::Close));
        assert_eq!(
            to_frame(Message::Binary(vec![0x1b, b'[', b'A'].into())),
            Some(Frame::Binary(vec![0x1b, b'[', b'A']))
        );
    }
}
