//! Streaming text-to-speech over persistent duplex connections.
//!
//! speechwire implements the client side of a family of WebSocket TTS
//! protocols: a session sends one synthesis request, receives an interleaved
//! stream of control and audio messages, and assembles the audio into a
//! single buffer under a deadline.
//!
//! # Features
//!
//! - **Two wire dialects**: a binary-framed protocol with typed headers and
//!   JSON control payloads, and a plain JSON-envelope protocol with base64
//!   audio chunks
//! - **Single-use sessions**: each session reaches exactly one terminal
//!   outcome and releases its connection on every exit path, including
//!   timeout and cancellation
//! - **Total inbound classification**: malformed input becomes a classified
//!   error value, never a panic, with a lenient fallback for servers that
//!   interleave unframed audio
//! - **Sequential batching**: ordered, paced, fail-fast execution of
//!   multiple requests
//!
//! # Example
//!
//! ```rust,no_run
//! use speechwire::{ProtocolConfig, ProtocolProfile, SynthesisRequest, open_session};
//!
//! # async fn example() -> speechwire::TTSResult<()> {
//! let config = ProtocolConfig::new("app-id", "access-token");
//! let request = SynthesisRequest::new("Hello from the wire").with_sample_rate(24000);
//!
//! let handle = open_session(ProtocolProfile::BinaryFrame, config, request)?;
//! let result = handle.result().await?;
//! println!("synthesized {} bytes of {}", result.audio.len(), result.format);
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod messages;
pub mod session;
pub mod transport;
pub mod types;

// Re-export commonly used items for convenience
pub use accumulator::ChunkAccumulator;
pub use batch::{BatchCoordinator, run_batch};
pub use codec::{Frame, SerializationMethod};
pub use config::{ProtocolConfig, ProtocolProfile};
pub use error::{TTSError, TTSResult};
pub use messages::Inbound;
pub use session::{SessionHandle, open_session};
pub use transport::{DuplexTransport, SessionEvent, WebSocketTransport};
pub use types::{AudioFormat, BatchJob, SynthesisRequest, SynthesisResult};
