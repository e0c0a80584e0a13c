//! Error type definitions
//!
//! Defines the error taxonomy used throughout the client. Transient
//! rate-limit conditions are recovered inside the transport; everything that
//! signals rejected credentials, rejected content or a changed protocol
//! contract reaches the caller with the raw platform payload attached.

use thiserror::Error;

/// Main error type for the web client
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Login / session establishment failures
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Transport-level failures (HTTP status, exhausted 429 retries)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Publishing failures
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// The platform answered with a shape this client does not understand
    #[error("Protocol drift at {endpoint}: {body}")]
    ProtocolDrift { endpoint: String, body: String },

    /// Session snapshot persistence errors
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// The call needs an authenticated session
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Network/HTTP client errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of a single login attempt. All of them are fatal to that attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The platform root did not issue a `csrftoken` cookie
    #[error("no CSRF token was issued by the platform")]
    NoCsrfToken,

    /// Credentials were refused; `message` is the platform's own text
    #[error("login rejected: {message}")]
    LoginRejected { message: String, body: String },

    /// The security checkpoint could not be passed
    #[error("checkpoint unresolved: {reason}")]
    CheckpointUnresolved { reason: String },

    /// The two-factor code was not accepted
    #[error("two-factor verification unresolved: {reason}")]
    TwoFactorUnresolved { reason: String },
}

/// Failures surfaced by the transport layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// HTTP 429 persisted past the configured retry bound
    #[error("rate limited after {attempts} attempts")]
    RateLimited { attempts: u32, body: String },

    /// Any other non-success status; never retried
    #[error("HTTP {code}: {body}")]
    HttpStatus { code: u16, body: String },
}

/// Failures of the two-phase publish protocol. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// The binary transfer phase was refused
    #[error("binary upload {upload_id} rejected (HTTP {status}): {body}")]
    BinaryRejected {
        upload_id: String,
        status: u16,
        body: String,
    },

    /// The configure phase did not yield a published media descriptor
    #[error("configure for upload {upload_id} rejected: {body}")]
    ConfigureRejected { upload_id: String, body: String },

    /// The source file could not be read
    #[error("media file not found: {path}")]
    MissingFile { path: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a protocol drift error for an endpoint and its raw body
    pub fn drift(endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        Self::ProtocolDrift {
            endpoint: endpoint.into(),
            body: body.into(),
        }
    }

    /// Create a session store error
    pub fn session_store(msg: impl Into<String>) -> Self {
        Self::SessionStore(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status carried by this error, if it came from the platform
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Transport(TransportError::HttpStatus { code, .. }) => Some(*code),
            Self::Transport(TransportError::RateLimited { .. }) => Some(429),
            _ => None,
        }
    }

    /// Whether this is the exhausted-retries rate limit condition
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Transport(TransportError::RateLimited { .. }))
    }
}
