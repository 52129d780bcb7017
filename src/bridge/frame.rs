// src/bridge/frame.rs
// Transport-neutral frame; the axum socket and test transports adapt to it

/// One message on the browser-facing duplex connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl Frame {
    /// Payload bytes for the remote shell. Control frames carry none.
    pub fn into_payload(self) -> Option<Vec<u8>> {
        match self {
            Frame::Text(text) => Some(text.into_bytes()),
            Frame::Binary(bytes) => Some(bytes),
            Frame::Close => None,
        }
    }
}
