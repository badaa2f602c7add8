//! Duplex channel abstraction and its WebSocket implementation.
//!
//! Sessions consume a flat stream of [`SessionEvent`]s instead of wiring up
//! callbacks, which keeps the state machine synchronous and testable. The
//! WebSocket transport connects lazily: the first `next_event()` call
//! performs the handshake and yields `Connected` or `Errored`.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::client::generate_key;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error};
use url::Url;

use crate::config::{ProtocolConfig, ProtocolProfile};
use crate::error::{TTSError, TTSResult};

// ============================================================================
// Session Events
// ============================================================================

/// Events a session consumes.
///
/// The first four originate from the transport; the last two are injected by
/// the session driver when its deadline fires or the caller cancels.
#[derive(Debug)]
pub enum SessionEvent {
    /// The channel finished connecting.
    Connected,
    /// One inbound message, text frames normalized to bytes.
    Message(Bytes),
    /// The channel closed cleanly.
    Closed,
    /// The channel failed; carries the classified error.
    Errored(TTSError),
    /// The session deadline elapsed.
    DeadlineElapsed,
    /// The caller requested cancellation.
    CancelRequested,
}

// ============================================================================
// Transport Trait
// ============================================================================

/// A duplex message channel: connect, send, receive, release.
#[async_trait]
pub trait DuplexTransport: Send {
    /// Produces the next channel event. The first call performs the
    /// connection attempt. After `Closed` or `Errored`, keeps returning
    /// `Closed`.
    async fn next_event(&mut self) -> SessionEvent;

    /// Sends one binary message.
    async fn send(&mut self, data: Bytes) -> TTSResult<()>;

    /// Releases the channel. Safe to call in any state, including before
    /// the connection attempt and after a failure.
    async fn close(&mut self);
}

// ============================================================================
// WebSocket Transport
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket-backed transport with profile-specific handshake headers.
pub struct WebSocketTransport {
    endpoint: String,
    headers: Vec<(&'static str, String)>,
    sink: Option<SplitSink<WsStream, Message>>,
    stream: Option<SplitStream<WsStream>>,
    finished: bool,
}

impl WebSocketTransport {
    /// Prepares a transport for the given profile. No I/O happens until the
    /// first `next_event()` call.
    pub fn new(profile: ProtocolProfile, config: &ProtocolConfig) -> Self {
        let endpoint = config.endpoint_for(profile).to_string();
        let headers = match profile {
            ProtocolProfile::BinaryFrame => vec![
                ("X-Api-App-Id", config.app_id.clone()),
                ("X-Api-Access-Key", config.access_token.clone()),
                ("X-Api-Resource-Id", config.resource_id.clone()),
            ],
            ProtocolProfile::JsonEnvelope => {
                vec![("Authorization", format!("Bearer; {}", config.access_token))]
            }
        };
        Self {
            endpoint,
            headers,
            sink: None,
            stream: None,
            finished: false,
        }
    }

    /// Builds the upgrade request carrying the auth headers.
    fn build_handshake_request(&self) -> TTSResult<Request<()>> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| TTSError::Connection(format!("invalid endpoint {}: {e}", self.endpoint)))?;
        let host = url
            .host_str()
            .ok_or_else(|| TTSError::Connection(format!("endpoint {} has no host", self.endpoint)))?;
        let host_header = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let mut builder = Request::builder()
            .method("GET")
            .uri(&self.endpoint)
            .header("Host", host_header)
            .header("Upgrade", "websocket")
            .header("Connection", "upgrade")
            .header("Sec-WebSocket-Key", generate_key())
            .header("Sec-WebSocket-Version", "13");
        for (name, value) in &self.headers {
            builder = builder.header(*name, value);
        }
        builder
            .body(())
            .map_err(|e| TTSError::Connection(format!("handshake request did not build: {e}")))
    }

    async fn connect(&mut self) -> TTSResult<()> {
        let request = self.build_handshake_request()?;
        let (ws_stream, _response) = connect_async(request)
            .await
            .map_err(|e| TTSError::from_ws_error(&e))?;
        debug!(endpoint = %self.endpoint, "WebSocket connected");
        let (sink, stream) = ws_stream.split();
        self.sink = Some(sink);
        self.stream = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl DuplexTransport for WebSocketTransport {
    async fn next_event(&mut self) -> SessionEvent {
        if self.finished {
            return SessionEvent::Closed;
        }
        if self.stream.is_none() {
            return match self.connect().await {
                Ok(()) => SessionEvent::Connected,
                Err(e) => {
                    self.finished = true;
                    SessionEvent::Errored(e)
                }
            };
        }
        let Some(stream) = self.stream.as_mut() else {
            return SessionEvent::Closed;
        };
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return SessionEvent::Message(data),
                Some(Ok(Message::Text(text))) => return SessionEvent::Message(Bytes::from(text)),
                // Pings are answered by the protocol layer on the next flush.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(endpoint = %self.endpoint, ?frame, "WebSocket closed by remote");
                    self.finished = true;
                    return SessionEvent::Closed;
                }
                Some(Err(e)) => {
                    error!(endpoint = %self.endpoint, "WebSocket stream failed: {e}");
                    self.finished = true;
                    return SessionEvent::Errored(TTSError::from_ws_error(&e));
                }
                None => {
                    self.finished = true;
                    return SessionEvent::Closed;
                }
            }
        }
    }

    async fn send(&mut self, data: Bytes) -> TTSResult<()> {
        match self.sink.as_mut() {
            Some(sink) => sink
                .send(Message::Binary(data))
                .await
                .map_err(|e| TTSError::from_ws_error(&e)),
            None => Err(TTSError::Connection(
                "send on an unconnected channel".to_string(),
            )),
        }
    }

    async fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!(endpoint = %self.endpoint, "close frame not delivered: {e}");
            }
            let _ = sink.close().await;
        }
        self.stream = None;
        self.finished = true;
    }
}
