//! Error taxonomy for synthesis sessions.
//!
//! Every failed session reports exactly one of these variants. Classification
//! happens at the boundary where the raw signal first appears: WebSocket
//! handshake failures in the transport, status codes in the message layer,
//! deadline expiry and cancellation in the session driver.

use std::time::Duration;

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type TTSResult<T> = Result<T, TTSError>;

/// Classified session errors.
#[derive(Debug, Error)]
pub enum TTSError {
    /// The duplex channel failed to open or dropped unexpectedly.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote endpoint rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The remote service reported an explicit non-success status.
    #[error("Remote service error {code}: {message}")]
    Remote { code: i32, message: String },

    /// Bytes violated the wire format where strict parsing applies.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The session finished without accumulating any audio.
    #[error("Synthesis produced no audio")]
    EmptyResult,

    /// The session deadline elapsed before a terminal state was reached.
    #[error("Session timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the session.
    #[error("Session cancelled")]
    Cancelled,

    /// A request or configuration failed validation before a session opened.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl TTSError {
    /// Classifies a WebSocket handshake or stream error.
    ///
    /// HTTP rejections during the upgrade are inspected for credential
    /// failures; everything else counts as a connection problem.
    pub fn from_ws_error(err: &tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::Http(response) => {
                let status = response.status();
                if status == http::StatusCode::UNAUTHORIZED
                    || status == http::StatusCode::FORBIDDEN
                {
                    Self::Authentication(format!("handshake rejected with HTTP {status}"))
                } else {
                    Self::Connection(format!("handshake failed with HTTP {status}"))
                }
            }
            other => Self::Connection(other.to_string()),
        }
    }

    /// True for errors raised before any bytes went over the wire.
    pub fn is_pre_flight(&self) -> bool {
        matches!(self, Self::InvalidConfiguration(_))
    }
}
