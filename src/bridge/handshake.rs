// src/bridge/handshake.rs
// First control frame: {"op":"auth","cols":N,"rows":N}

use serde::Deserialize;

use super::error::BridgeError;
use super::frame::Frame;

pub const AUTH_OP: &str = "auth";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthMessage {
    pub op: String,
    #[serde(default)]
    pub cols: Option<i64>,
    #[serde(default)]
    pub rows: Option<i64>,
}

/// Text or binary frames are both accepted as JSON; anything else, or an op
/// other than `auth`, is an invalid handshake.
pub fn parse_auth_frame(frame: Frame) -> Result<AuthMessage, BridgeError> {
    let message: AuthMessage = match frame {
        Frame::Text(text) => serde_json::from_str(&text),
        Frame::Binary(bytes) => serde_json::from_slice(&bytes),
        Frame::Close => {
            return Err(BridgeError::InvalidHandshake(
                "connection closed before auth".to_string(),
            ));
        }
    }
    .map_err(|e| BridgeError::InvalidHandshake(e.to_string()))?;

    if message.op != AUTH_OP {
        return Err(BridgeError::InvalidHandshake(format!(
            "expected op \"{}\", got {:?}",
            AUTH_OP, message.op
        )));
    }

    Ok(message)
}
