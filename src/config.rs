//! Session configuration and protocol profile selection.
//!
//! # Features
//!
//! - **Two wire dialects**: [`ProtocolProfile`] selects between the
//!   binary-framed and JSON-envelope protocols at session open time
//! - **Builder-style configuration**: credentials, endpoint override,
//!   deadline, and batch pacing with sensible defaults
//! - **Environment loading**: `ProtocolConfig::from_env()` reads the
//!   `SPEECHWIRE_*` variables for deployments that configure via env

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{TTSError, TTSResult};

// ============================================================================
// Defaults
// ============================================================================

/// Default session deadline in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default pause between consecutive batch requests in milliseconds.
pub const DEFAULT_INTER_REQUEST_DELAY_MS: u64 = 200;

/// Default resource identifier announced by binary-framed sessions.
pub const DEFAULT_RESOURCE_ID: &str = "seed-tts-2.0";

/// Default cluster announced by JSON-envelope sessions.
pub const DEFAULT_CLUSTER: &str = "volcano_tts";

/// Default user identifier sent in request envelopes.
pub const DEFAULT_UID: &str = "anonymous";

/// Default endpoint for the binary-framed dialect.
pub const BINARY_FRAME_ENDPOINT: &str = "wss://openspeech.bytedance.com/api/v3/tts/bidirection";

/// Default endpoint for the JSON-envelope dialect.
pub const JSON_ENVELOPE_ENDPOINT: &str = "wss://openspeech.bytedance.com/api/v1/tts/ws_binary";

// Environment variable names read by `ProtocolConfig::from_env`.
pub const ENV_APP_ID: &str = "SPEECHWIRE_APP_ID";
pub const ENV_ACCESS_TOKEN: &str = "SPEECHWIRE_ACCESS_TOKEN";
pub const ENV_RESOURCE_ID: &str = "SPEECHWIRE_RESOURCE_ID";
pub const ENV_CLUSTER: &str = "SPEECHWIRE_CLUSTER";
pub const ENV_ENDPOINT: &str = "SPEECHWIRE_ENDPOINT";
pub const ENV_UID: &str = "SPEECHWIRE_UID";
pub const ENV_TIMEOUT_MS: &str = "SPEECHWIRE_TIMEOUT_MS";

// ============================================================================
// Protocol Profile
// ============================================================================

/// Wire dialect spoken over the duplex channel.
///
/// Both dialects share the session lifecycle, accumulation, and error
/// taxonomy; they differ only in message encoding and handshake headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolProfile {
    /// Binary frames with a 4-byte header, optional event number, and
    /// JSON control payloads.
    BinaryFrame,
    /// Plain JSON response envelopes with base64 audio and a sequence
    /// completion sentinel.
    JsonEnvelope,
}

impl ProtocolProfile {
    /// Short identifier used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BinaryFrame => "binary-frame",
            Self::JsonEnvelope => "json-envelope",
        }
    }

    /// Endpoint used when the configuration carries no override.
    pub const fn default_endpoint(&self) -> &'static str {
        match self {
            Self::BinaryFrame => BINARY_FRAME_ENDPOINT,
            Self::JsonEnvelope => JSON_ENVELOPE_ENDPOINT,
        }
    }
}

impl std::fmt::Display for ProtocolProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Protocol Config
// ============================================================================

/// Connection and pacing configuration shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolConfig {
    /// Application identifier issued by the service.
    pub app_id: String,
    /// Access token or key issued by the service.
    pub access_token: String,
    /// Resource identifier, used by the binary-framed dialect.
    pub resource_id: String,
    /// Cluster name, used by the JSON-envelope dialect.
    pub cluster: String,
    /// Endpoint override. When unset, the profile default applies.
    pub endpoint: Option<String>,
    /// User identifier sent in request envelopes.
    pub uid: String,
    /// Session deadline in milliseconds. Zero expires immediately.
    pub timeout_ms: u64,
    /// Default pause between consecutive batch requests in milliseconds.
    pub inter_request_delay_ms: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            access_token: String::new(),
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            cluster: DEFAULT_CLUSTER.to_string(),
            endpoint: None,
            uid: DEFAULT_UID.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            inter_request_delay_ms: DEFAULT_INTER_REQUEST_DELAY_MS,
        }
    }
}

impl ProtocolConfig {
    /// Creates a configuration with the given credentials and defaults
    /// everywhere else.
    pub fn new(app_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            access_token: access_token.into(),
            ..Default::default()
        }
    }

    /// Loads the configuration from `SPEECHWIRE_*` environment variables.
    ///
    /// `SPEECHWIRE_APP_ID` and `SPEECHWIRE_ACCESS_TOKEN` are required;
    /// everything else falls back to the defaults.
    pub fn from_env() -> TTSResult<Self> {
        let app_id = env::var(ENV_APP_ID)
            .map_err(|_| TTSError::InvalidConfiguration(format!("{ENV_APP_ID} is not set")))?;
        let access_token = env::var(ENV_ACCESS_TOKEN)
            .map_err(|_| TTSError::InvalidConfiguration(format!("{ENV_ACCESS_TOKEN} is not set")))?;

        let mut config = Self::new(app_id, access_token);
        if let Ok(resource_id) = env::var(ENV_RESOURCE_ID) {
            config.resource_id = resource_id;
        }
        if let Ok(cluster) = env::var(ENV_CLUSTER) {
            config.cluster = cluster;
        }
        if let Ok(endpoint) = env::var(ENV_ENDPOINT) {
            config.endpoint = Some(endpoint);
        }
        if let Ok(uid) = env::var(ENV_UID) {
            config.uid = uid;
        }
        if let Ok(timeout) = env::var(ENV_TIMEOUT_MS) {
            config.timeout_ms = timeout.parse().map_err(|_| {
                TTSError::InvalidConfiguration(format!(
                    "{ENV_TIMEOUT_MS} must be an integer, got {timeout:?}"
                ))
            })?;
        }

        config.validate().map_err(TTSError::InvalidConfiguration)?;
        Ok(config)
    }

    /// Sets the resource identifier.
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }

    /// Sets the cluster name.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Overrides the connection endpoint for both profiles.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the user identifier sent in request envelopes.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    /// Sets the session deadline in milliseconds. Zero expires immediately.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the default pause between consecutive batch requests.
    pub fn with_inter_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.inter_request_delay_ms = delay_ms;
        self
    }

    /// Session deadline as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Default batch pacing as a duration.
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    /// Endpoint a session of the given profile connects to.
    pub fn endpoint_for(&self, profile: ProtocolProfile) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| profile.default_endpoint())
    }

    /// Validates credentials and the endpoint override.
    ///
    /// A zero timeout is accepted; it produces a session that times out on
    /// its first scheduling point, which is useful for drills and tests.
    pub fn validate(&self) -> Result<(), String> {
        if self.app_id.is_empty() {
            return Err("App id must not be empty".to_string());
        }
        if self.access_token.is_empty() {
            return Err("Access token must not be empty".to_string());
        }
        if let Some(endpoint) = &self.endpoint {
            let url = Url::parse(endpoint)
                .map_err(|e| format!("Invalid endpoint {endpoint:?}: {e}"))?;
            if url.scheme() != "ws" && url.scheme() != "wss" {
                return Err(format!(
                    "Endpoint scheme must be ws or wss, got {:?}",
                    url.scheme()
                ));
            }
            if url.host_str().is_none() {
                return Err(format!("Endpoint {endpoint:?} has no host"));
            }
        }
        Ok(())
    }
}
