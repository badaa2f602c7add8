//! Session lifecycle: the state machine, its driver task, and the handle.
//!
//! # Architecture
//!
//! ```text
//! open_session()
//!      |                         +--------------------+
//!      |-- validate, spawn --->  |  driver task       |
//!      |                         |  select! {         |
//!      v                         |    cancel          |
//!  SessionHandle                 |    deadline        |
//!   .result()  <-- oneshot --    |    transport event |
//!   .cancel()  --- oneshot -->   |  } -> state machine|
//!                                +--------------------+
//! ```
//!
//! The state machine ([`ProtocolSession`]) is synchronous: it consumes one
//! [`SessionEvent`] at a time and returns what the driver should do next.
//! All timing and I/O live in the driver, so every lifecycle rule, including
//! the single-terminal-transition guarantee, is testable without a socket.
//!
//! A session is single-use. It moves `INIT -> CONNECTING -> STREAMING` and
//! then exactly once into `COMPLETED`, `FAILED`, or `TIMED_OUT`; the
//! transport is released on every exit path before the outcome is reported.

use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accumulator::ChunkAccumulator;
use crate::config::{ProtocolConfig, ProtocolProfile};
use crate::error::{TTSError, TTSResult};
use crate::messages::{self, Inbound};
use crate::transport::{DuplexTransport, SessionEvent, WebSocketTransport};
use crate::types::{SynthesisRequest, SynthesisResult};

// ============================================================================
// State Machine
// ============================================================================

/// Lifecycle states. The bottom three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Init,
    Connecting,
    Streaming,
    Completed,
    Failed,
    TimedOut,
}

impl SessionState {
    fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

/// What the driver should do after an event was applied.
#[derive(Debug)]
enum SessionStep {
    /// Keep consuming events.
    Continue,
    /// Send these bytes, then keep consuming events.
    Send(Bytes),
    /// A terminal state was reached; stop the loop.
    Done,
}

/// One synthesis exchange: request, accumulated audio, and terminal outcome.
struct ProtocolSession {
    id: Uuid,
    profile: ProtocolProfile,
    config: ProtocolConfig,
    request: SynthesisRequest,
    state: SessionState,
    accumulator: ChunkAccumulator,
    timeout: Duration,
    outcome: Option<TTSResult<SynthesisResult>>,
}

impl ProtocolSession {
    fn new(profile: ProtocolProfile, config: ProtocolConfig, request: SynthesisRequest) -> Self {
        let timeout = config.timeout();
        Self {
            id: Uuid::new_v4(),
            profile,
            config,
            request,
            state: SessionState::Init,
            accumulator: ChunkAccumulator::new(),
            timeout,
            outcome: None,
        }
    }

    /// Marks the session as opening. The driver arms the deadline alongside.
    fn begin(&mut self) {
        if self.state == SessionState::Init {
            self.state = SessionState::Connecting;
        }
    }

    /// Applies one event. Events arriving after a terminal transition are
    /// ignored, which is what makes the terminal transition unique.
    fn handle_event(&mut self, event: SessionEvent) -> SessionStep {
        if self.state.is_terminal() {
            debug!(session = %self.id, ?event, "event after terminal state ignored");
            return SessionStep::Continue;
        }
        match event {
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::Message(bytes) => self.on_message(bytes),
            SessionEvent::Closed => self.on_closed(),
            SessionEvent::Errored(error) => self.fail(error),
            SessionEvent::DeadlineElapsed => {
                warn!(session = %self.id, timeout = ?self.timeout, "session deadline elapsed");
                self.state = SessionState::TimedOut;
                self.outcome = Some(Err(TTSError::Timeout(self.timeout)));
                SessionStep::Done
            }
            SessionEvent::CancelRequested => {
                // Same transition as the deadline, different reported error.
                debug!(session = %self.id, "session cancelled");
                self.state = SessionState::TimedOut;
                self.outcome = Some(Err(TTSError::Cancelled));
                SessionStep::Done
            }
        }
    }

    fn on_connected(&mut self) -> SessionStep {
        if self.state != SessionState::Connecting {
            return SessionStep::Continue;
        }
        self.state = SessionState::Streaming;
        let encoded = match self.profile {
            ProtocolProfile::BinaryFrame => {
                messages::encode_binary_request(&self.config, &self.request)
            }
            ProtocolProfile::JsonEnvelope => {
                messages::encode_envelope_request(&self.config, &self.request)
            }
        };
        match encoded {
            Ok(bytes) => SessionStep::Send(bytes),
            Err(e) => self.fail(e),
        }
    }

    fn on_message(&mut self, bytes: Bytes) -> SessionStep {
        if self.state != SessionState::Streaming {
            debug!(session = %self.id, "message outside streaming ignored");
            return SessionStep::Continue;
        }
        let inbound = match self.profile {
            ProtocolProfile::BinaryFrame => messages::classify_binary_frame(&bytes),
            ProtocolProfile::JsonEnvelope => messages::classify_json_envelope(&bytes),
        };
        match inbound {
            Inbound::Audio(chunk) => {
                self.accumulator.append(chunk);
                SessionStep::Continue
            }
            Inbound::FinalAudio(chunk) => {
                self.accumulator.append(chunk);
                self.complete()
            }
            Inbound::Complete => self.complete(),
            Inbound::Ignore => SessionStep::Continue,
            Inbound::RemoteError { code, message } => {
                self.fail(TTSError::Remote { code, message })
            }
            Inbound::Malformed(detail) => self.fail(TTSError::MalformedFrame(detail)),
        }
    }

    /// A clean close during streaming completes the session when audio has
    /// already arrived; with nothing accumulated it is an empty result.
    fn on_closed(&mut self) -> SessionStep {
        match self.state {
            SessionState::Streaming if self.accumulator.chunk_count() > 0 => self.complete(),
            SessionState::Streaming => self.fail(TTSError::EmptyResult),
            _ => self.fail(TTSError::Connection(
                "channel closed before the request was sent".to_string(),
            )),
        }
    }

    fn complete(&mut self) -> SessionStep {
        let accumulated = std::mem::take(&mut self.accumulator);
        match accumulated.assemble() {
            Ok(audio) => {
                info!(
                    session = %self.id,
                    bytes = audio.len(),
                    "synthesis completed"
                );
                self.state = SessionState::Completed;
                self.outcome = Some(Ok(SynthesisResult::assemble(
                    audio,
                    self.request.format,
                    self.request.sample_rate,
                )));
            }
            // Completion with zero chunks is a failure, not empty audio.
            Err(e) => {
                warn!(session = %self.id, "completion signal with no audio");
                self.state = SessionState::Failed;
                self.outcome = Some(Err(e));
            }
        }
        SessionStep::Done
    }

    fn fail(&mut self, error: TTSError) -> SessionStep {
        warn!(session = %self.id, %error, "session failed");
        self.state = SessionState::Failed;
        self.outcome = Some(Err(error));
        SessionStep::Done
    }

    fn take_outcome(&mut self) -> TTSResult<SynthesisResult> {
        self.outcome.take().unwrap_or_else(|| {
            Err(TTSError::Connection(
                "session ended without an outcome".to_string(),
            ))
        })
    }
}

// ============================================================================
// Session Handle
// ============================================================================

/// Handle to a running session.
///
/// `result()` awaits the terminal outcome; `cancel()` requests termination
/// and reports [`TTSError::Cancelled`] to the awaiter. Dropping the handle
/// without awaiting cancels the session too, so an abandoned session never
/// keeps its connection alive.
pub struct SessionHandle {
    id: Uuid,
    outcome_rx: oneshot::Receiver<TTSResult<SynthesisResult>>,
    cancel_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl SessionHandle {
    /// Correlation id of this session, also present in its log records.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests cancellation. Idempotent, and a no-op once the session has
    /// reached a terminal state.
    pub fn cancel(&self) {
        if let Some(tx) = self.cancel_tx.lock().take() {
            let _ = tx.send(());
        }
    }

    /// Awaits the terminal outcome: the assembled result or exactly one
    /// classified error.
    pub async fn result(mut self) -> TTSResult<SynthesisResult> {
        match (&mut self.outcome_rx).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TTSError::Connection(
                "session ended without reporting an outcome".to_string(),
            )),
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Drives one session: arms the deadline, relays transport events into the
/// state machine, and releases the transport on every exit path.
async fn drive_session(
    mut session: ProtocolSession,
    mut transport: Box<dyn DuplexTransport>,
    deadline: Instant,
    mut cancel_rx: oneshot::Receiver<()>,
    outcome_tx: oneshot::Sender<TTSResult<SynthesisResult>>,
) {
    let deadline_timer = sleep_until(deadline);
    tokio::pin!(deadline_timer);

    session.begin();
    loop {
        // Cancellation and the deadline win a tie against channel activity,
        // which keeps a zero timeout deterministic. The cancel branch also
        // fires when the handle is dropped without awaiting.
        let event = tokio::select! {
            biased;
            _ = &mut cancel_rx => SessionEvent::CancelRequested,
            _ = &mut deadline_timer => SessionEvent::DeadlineElapsed,
            event = transport.next_event() => event,
        };
        match session.handle_event(event) {
            SessionStep::Continue => {}
            SessionStep::Send(bytes) => {
                if let Err(e) = transport.send(bytes).await {
                    session.handle_event(SessionEvent::Errored(e));
                    break;
                }
            }
            SessionStep::Done => break,
        }
    }
    transport.close().await;
    let _ = outcome_tx.send(session.take_outcome());
}

/// Opens a synthesis session and returns its handle without waiting for the
/// connection.
///
/// The configuration and request are validated up front; the connection
/// attempt, the request send, and all streaming happen on the session's
/// driver task under the configured deadline. Must be called from within a
/// tokio runtime.
pub fn open_session(
    profile: ProtocolProfile,
    config: ProtocolConfig,
    request: SynthesisRequest,
) -> TTSResult<SessionHandle> {
    config.validate().map_err(TTSError::InvalidConfiguration)?;
    request.validate().map_err(TTSError::InvalidConfiguration)?;

    let transport = Box::new(WebSocketTransport::new(profile, &config));
    let session = ProtocolSession::new(profile, config, request);
    let id = session.id;
    let deadline = Instant::now() + session.timeout;
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    info!(session = %id, %profile, "opening synthesis session");
    tokio::spawn(drive_session(
        session,
        transport,
        deadline,
        cancel_rx,
        outcome_tx,
    ));

    Ok(SessionHandle {
        id,
        outcome_rx,
        cancel_tx: Mutex::new(Some(cancel_tx)),
    })
}
