//! Request envelopes and inbound classification for both wire dialects.
//!
//! # Features
//!
//! - **Typed request envelopes**: serde structs mirroring each dialect's
//!   JSON request shape, never hand-assembled strings
//! - **Total classification**: every inbound byte sequence maps to exactly
//!   one [`Inbound`] variant; malformed input becomes a value, not a panic
//! - **Two-branch decode policy**: input that is not even shaped like a
//!   frame (or not a JSON object) is passed through as raw audio, while
//!   frame-shaped or object-shaped input is parsed strictly
//!
//! The session layer decides what each variant means for the lifecycle;
//! this module only translates bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::codec::Frame;
use crate::codec::SerializationMethod;
use crate::config::ProtocolConfig;
use crate::error::{TTSError, TTSResult};
use crate::types::{DEFAULT_PITCH, SynthesisRequest};

// ============================================================================
// Wire Constants
// ============================================================================

/// Namespace announced in binary-framed session requests.
pub const BINARY_NAMESPACE: &str = "BidirectionalTTS";

/// Event number attached to the binary-framed session request.
pub const REQUEST_EVENT: u32 = 100;

/// Status code that finalizes a binary-framed session successfully.
pub const BINARY_SUCCESS_STATUS: i32 = 20_000_000;

/// Code that marks a JSON-envelope response as successful.
pub const ENVELOPE_SUCCESS_CODE: i32 = 3000;

/// Sequence value signalling the final envelope of a stream. Any negative
/// sequence is treated as final.
pub const ENVELOPE_FINAL_SEQUENCE: i32 = -1;

/// Text type announced in JSON-envelope requests.
pub const ENVELOPE_TEXT_TYPE: &str = "plain";

/// Operation announced in JSON-envelope requests.
pub const ENVELOPE_OPERATION: &str = "submit";

// ============================================================================
// Outbound: Binary-Framed Request
// ============================================================================

/// JSON payload of the binary-framed session request frame.
#[derive(Debug, Serialize)]
pub struct BinaryRequestEnvelope {
    pub namespace: &'static str,
    pub event: u32,
    pub user: UserField,
    pub req_params: ReqParams,
}

#[derive(Debug, Serialize)]
pub struct UserField {
    pub uid: String,
}

#[derive(Debug, Serialize)]
pub struct ReqParams {
    pub text: String,
    pub speaker: String,
    pub audio_params: AudioParams,
}

#[derive(Debug, Serialize)]
pub struct AudioParams {
    pub format: &'static str,
    pub sample_rate: u32,
    pub speed_ratio: f32,
    pub volume_ratio: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_ratio: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

impl BinaryRequestEnvelope {
    /// Builds the session request envelope for one synthesis request.
    pub fn new(config: &ProtocolConfig, request: &SynthesisRequest) -> Self {
        Self {
            namespace: BINARY_NAMESPACE,
            event: REQUEST_EVENT,
            user: UserField {
                uid: config.uid.clone(),
            },
            req_params: ReqParams {
                text: request.text.clone(),
                speaker: request.voice.clone(),
                audio_params: AudioParams {
                    format: request.format.as_str(),
                    sample_rate: request.sample_rate,
                    speed_ratio: request.speed,
                    volume_ratio: request.volume,
                    pitch_ratio: request.pitch,
                    emotion: request.emotion.clone(),
                },
            },
        }
    }
}

/// Encodes the binary-framed session request into one wire frame.
pub fn encode_binary_request(
    config: &ProtocolConfig,
    request: &SynthesisRequest,
) -> TTSResult<Bytes> {
    let envelope = BinaryRequestEnvelope::new(config, request);
    let payload = serde_json::to_vec(&envelope).map_err(|e| {
        TTSError::InvalidConfiguration(format!("request envelope did not serialize: {e}"))
    })?;
    Frame::json_request(payload.into(), Some(REQUEST_EVENT)).encode()
}

// ============================================================================
// Outbound: JSON-Envelope Request
// ============================================================================

/// JSON body of the JSON-envelope session request.
#[derive(Debug, Serialize)]
pub struct EnvelopeRequest {
    pub app: AppField,
    pub user: UserField,
    pub audio: AudioField,
    pub request: RequestField,
}

#[derive(Debug, Serialize)]
pub struct AppField {
    pub appid: String,
    pub token: String,
    pub cluster: String,
}

#[derive(Debug, Serialize)]
pub struct AudioField {
    pub voice_type: String,
    pub encoding: &'static str,
    pub speed_ratio: f32,
    pub volume_ratio: f32,
    pub pitch_ratio: f32,
}

#[derive(Debug, Serialize)]
pub struct RequestField {
    pub reqid: String,
    pub text: String,
    pub text_type: &'static str,
    pub operation: &'static str,
}

impl EnvelopeRequest {
    /// Builds the request body with a fresh correlation id.
    pub fn new(config: &ProtocolConfig, request: &SynthesisRequest) -> Self {
        Self {
            app: AppField {
                appid: config.app_id.clone(),
                token: config.access_token.clone(),
                cluster: config.cluster.clone(),
            },
            user: UserField {
                uid: config.uid.clone(),
            },
            audio: AudioField {
                voice_type: request.voice.clone(),
                encoding: request.format.as_str(),
                speed_ratio: request.speed,
                volume_ratio: request.volume,
                pitch_ratio: request.pitch.unwrap_or(DEFAULT_PITCH),
            },
            request: RequestField {
                reqid: Uuid::new_v4().to_string(),
                text: request.text.clone(),
                text_type: ENVELOPE_TEXT_TYPE,
                operation: ENVELOPE_OPERATION,
            },
        }
    }
}

/// Serializes the JSON-envelope session request.
pub fn encode_envelope_request(
    config: &ProtocolConfig,
    request: &SynthesisRequest,
) -> TTSResult<Bytes> {
    let envelope = EnvelopeRequest::new(config, request);
    let payload = serde_json::to_vec(&envelope).map_err(|e| {
        TTSError::InvalidConfiguration(format!("request body did not serialize: {e}"))
    })?;
    Ok(payload.into())
}

// ============================================================================
// Inbound Classification
// ============================================================================

/// Classification of one inbound transport message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Raw audio payload to append to the accumulator.
    Audio(Bytes),
    /// Audio payload whose envelope also completes the stream.
    FinalAudio(Bytes),
    /// Completion signal without audio.
    Complete,
    /// Control traffic that requires no action.
    Ignore,
    /// Explicit error status from the remote service.
    RemoteError { code: i32, message: String },
    /// Wire format violation on the strict side of the decode boundary.
    Malformed(String),
}

/// Control payload carried by JSON-serialized binary frames.
#[derive(Debug, Deserialize)]
struct BinaryControlPayload {
    status_code: Option<i32>,
    message: Option<String>,
}

/// One JSON-envelope response message.
#[derive(Debug, Deserialize)]
pub struct EnvelopeResponse {
    pub code: i32,
    pub message: Option<String>,
    /// Base64-encoded audio chunk.
    pub data: Option<String>,
    pub sequence: i32,
}

/// Classifies one message received on a binary-framed session.
///
/// Input too short for a header or without the recognized version nibble is
/// bare audio; some deployments interleave unframed chunks. Frame-shaped
/// input is decoded strictly.
pub fn classify_binary_frame(bytes: &Bytes) -> Inbound {
    if !Frame::looks_like_frame(bytes) {
        return Inbound::Audio(bytes.clone());
    }
    let frame = match Frame::decode(bytes) {
        Ok(frame) => frame,
        Err(TTSError::MalformedFrame(detail)) => return Inbound::Malformed(detail),
        Err(other) => return Inbound::Malformed(other.to_string()),
    };
    match frame.serialization {
        SerializationMethod::Raw => Inbound::Audio(frame.payload),
        SerializationMethod::Json => classify_binary_control(&frame),
    }
}

fn classify_binary_control(frame: &Frame) -> Inbound {
    let payload: BinaryControlPayload = match serde_json::from_slice(&frame.payload) {
        Ok(payload) => payload,
        Err(e) => return Inbound::Malformed(format!("control payload is not valid JSON: {e}")),
    };
    match payload.status_code {
        Some(BINARY_SUCCESS_STATUS) => Inbound::Complete,
        Some(code) => Inbound::RemoteError {
            code,
            message: payload.message.unwrap_or_default(),
        },
        // Acks and session bookkeeping carry no status code.
        None => Inbound::Ignore,
    }
}

/// Classifies one message received on a JSON-envelope session.
///
/// Only JSON objects are control messages. Anything that does not parse as
/// JSON, or parses to a non-object, is raw audio; an object that does not
/// match the response shape is malformed.
pub fn classify_json_envelope(bytes: &Bytes) -> Inbound {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => return Inbound::Audio(bytes.clone()),
    };
    if !value.is_object() {
        return Inbound::Audio(bytes.clone());
    }
    let response: EnvelopeResponse = match serde_json::from_value(value) {
        Ok(response) => response,
        Err(e) => return Inbound::Malformed(format!("response envelope mismatch: {e}")),
    };
    classify_envelope_response(response)
}

fn classify_envelope_response(response: EnvelopeResponse) -> Inbound {
    if response.code != ENVELOPE_SUCCESS_CODE {
        return Inbound::RemoteError {
            code: response.code,
            message: response.message.unwrap_or_default(),
        };
    }
    let audio = match response.data.as_deref() {
        Some(data) => match BASE64_STANDARD.decode(data) {
            Ok(audio) => Some(Bytes::from(audio)),
            Err(e) => return Inbound::Malformed(format!("audio data is not valid base64: {e}")),
        },
        None => None,
    };
    let finished = response.sequence < 0;
    match (audio, finished) {
        (Some(audio), true) => Inbound::FinalAudio(audio),
        (Some(audio), false) => Inbound::Audio(audio),
        (None, true) => Inbound::Complete,
        (None, false) => Inbound::Ignore,
    }
}
