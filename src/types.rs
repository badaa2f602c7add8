//! Public data model: synthesis requests, assembled results, and batch jobs.
//!
//! # Features
//!
//! - **Typed audio formats**: wire identifiers and sample-size metadata in
//!   one place
//! - **Builder-style requests**: `SynthesisRequest::new("...").with_voice(...)`
//!   with range clamping on the prosody multipliers
//! - **Validation before the wire**: `validate()` catches empty text and
//!   out-of-range parameters before a connection is opened

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ============================================================================
// Limits and Defaults
// ============================================================================

/// Default voice identifier.
pub const DEFAULT_VOICE: &str = "zh_female_cancan_mars_bigtts";

/// Default output sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// Minimum speed multiplier.
pub const MIN_SPEED: f32 = 0.2;
/// Maximum speed multiplier.
pub const MAX_SPEED: f32 = 3.0;
/// Default speed multiplier (normal pace).
pub const DEFAULT_SPEED: f32 = 1.0;

/// Minimum volume multiplier.
pub const MIN_VOLUME: f32 = 0.1;
/// Maximum volume multiplier.
pub const MAX_VOLUME: f32 = 3.0;
/// Default volume multiplier (no gain change).
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Minimum pitch multiplier.
pub const MIN_PITCH: f32 = 0.1;
/// Maximum pitch multiplier.
pub const MAX_PITCH: f32 = 3.0;
/// Default pitch multiplier (unshifted).
pub const DEFAULT_PITCH: f32 = 1.0;

// ============================================================================
// Audio Format
// ============================================================================

/// Output audio container requested from the synthesis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Layer 3, the default container.
    #[default]
    Mp3,
    /// 16-bit signed little-endian PCM, mono.
    Pcm,
    /// Ogg container with Opus codec.
    OggOpus,
}

impl AudioFormat {
    /// Wire identifier used in request envelopes.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Pcm => "pcm",
            Self::OggOpus => "ogg_opus",
        }
    }

    /// Bytes per sample for uncompressed formats, `None` for compressed ones.
    #[inline]
    pub const fn bytes_per_sample(&self) -> Option<usize> {
        match self {
            Self::Pcm => Some(2),
            Self::Mp3 | Self::OggOpus => None,
        }
    }

    /// All supported formats.
    pub const fn all() -> &'static [AudioFormat] {
        &[AudioFormat::Mp3, AudioFormat::Pcm, AudioFormat::OggOpus]
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Synthesis Request
// ============================================================================

/// One text-to-speech request.
///
/// Prosody setters clamp to the supported ranges; `validate()` re-checks the
/// ranges for requests built with struct literals.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    /// Text to synthesize. Must be non-empty.
    pub text: String,
    /// Voice identifier.
    pub voice: String,
    /// Output audio container.
    pub format: AudioFormat,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Speed multiplier in `[0.2, 3.0]`.
    pub speed: f32,
    /// Volume multiplier in `[0.1, 3.0]`.
    pub volume: f32,
    /// Optional pitch multiplier in `[0.1, 3.0]`.
    pub pitch: Option<f32>,
    /// Optional emotion hint, passed through verbatim.
    pub emotion: Option<String>,
}

impl SynthesisRequest {
    /// Creates a request with default voice and audio parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: DEFAULT_VOICE.to_string(),
            format: AudioFormat::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            speed: DEFAULT_SPEED,
            volume: DEFAULT_VOLUME,
            pitch: None,
            emotion: None,
        }
    }

    /// Sets the voice identifier.
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Sets the output audio container.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the output sample rate in Hz.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Sets the speed multiplier, clamped to the supported range.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self
    }

    /// Sets the volume multiplier, clamped to the supported range.
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(MIN_VOLUME, MAX_VOLUME);
        self
    }

    /// Sets the pitch multiplier, clamped to the supported range.
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = Some(pitch.clamp(MIN_PITCH, MAX_PITCH));
        self
    }

    /// Sets the emotion hint.
    pub fn with_emotion(mut self, emotion: impl Into<String>) -> Self {
        self.emotion = Some(emotion.into());
        self
    }

    /// Validates the request before any connection is opened.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("Text must not be empty".to_string());
        }
        if self.voice.is_empty() {
            return Err("Voice identifier must not be empty".to_string());
        }
        if self.sample_rate == 0 {
            return Err("Sample rate must be positive".to_string());
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(format!(
                "Speed {} outside supported range {MIN_SPEED}-{MAX_SPEED}",
                self.speed
            ));
        }
        if !(MIN_VOLUME..=MAX_VOLUME).contains(&self.volume) {
            return Err(format!(
                "Volume {} outside supported range {MIN_VOLUME}-{MAX_VOLUME}",
                self.volume
            ));
        }
        if let Some(pitch) = self.pitch {
            if !(MIN_PITCH..=MAX_PITCH).contains(&pitch) {
                return Err(format!(
                    "Pitch {pitch} outside supported range {MIN_PITCH}-{MAX_PITCH}"
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Synthesis Result
// ============================================================================

/// Assembled synthesis output. Produced only by sessions that completed.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Concatenated audio payloads in arrival order.
    pub audio: Bytes,
    /// Container the audio was requested in.
    pub format: AudioFormat,
    /// Estimated playback duration, when derivable from the format.
    pub duration_ms: Option<u64>,
}

impl SynthesisResult {
    /// Builds a result, estimating duration for uncompressed audio.
    pub fn assemble(audio: Bytes, format: AudioFormat, sample_rate: u32) -> Self {
        let duration_ms = estimate_duration_ms(audio.len(), format, sample_rate);
        Self {
            audio,
            format,
            duration_ms,
        }
    }
}

/// Estimates playback duration for uncompressed mono audio.
///
/// Compressed containers return `None` since frame sizes vary with content.
fn estimate_duration_ms(byte_len: usize, format: AudioFormat, sample_rate: u32) -> Option<u64> {
    let bytes_per_sample = format.bytes_per_sample()?;
    if sample_rate == 0 {
        return None;
    }
    let samples = (byte_len / bytes_per_sample) as u64;
    Some(samples * 1000 / u64::from(sample_rate))
}

// ============================================================================
// Batch Job
// ============================================================================

/// An ordered batch of synthesis requests processed strictly in sequence.
///
/// Batches are fail-fast: the first failed session aborts the remainder and
/// its error is returned in place of any partial result list.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    /// Requests in submission order.
    pub requests: Vec<SynthesisRequest>,
    /// Pause between consecutive requests. Falls back to the configured
    /// default when unset.
    pub inter_request_delay: Option<Duration>,
}

impl BatchJob {
    /// Creates a job over the given requests with the default pacing.
    pub fn new(requests: Vec<SynthesisRequest>) -> Self {
        Self {
            requests,
            inter_request_delay: None,
        }
    }

    /// Overrides the pause inserted between consecutive requests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.inter_request_delay = Some(delay);
        self
    }
}
