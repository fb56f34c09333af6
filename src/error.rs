//! Error taxonomy for the console.
//!
//! ERROR HANDLING
//! ==============
//! Auth, request, and validation failures are all user-facing: callers at an
//! action boundary turn them into a banner or alert via `user_message()`.
//! Nothing here is fatal to the process, and nothing is retried automatically.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Stable machine-readable code attached to structured log lines.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;
}

// =============================================================================
// AUTH
// =============================================================================

/// Failures reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// Email/password pair rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Signed in, but the email address has not been confirmed.
    #[error("email address not verified")]
    EmailNotVerified,

    /// Account creation or verification email failed.
    #[error("registration failed: {0}")]
    Registration(String),

    /// Password-reset email could not be sent.
    #[error("password reset failed: {0}")]
    PasswordReset(String),

    /// The provider could not issue or refresh a bearer token.
    #[error("token request failed: {0}")]
    Token(String),

    /// The provider was unreachable or answered with garbage.
    #[error("identity provider request failed: {0}")]
    Transport(String),
}

impl AuthError {
    /// Provider-side message without the variant prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::InvalidCredentials | Self::EmailNotVerified => self.to_string(),
            Self::Registration(m) | Self::PasswordReset(m) | Self::Token(m) | Self::Transport(m) => m.clone(),
        }
    }
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::EmailNotVerified => "E_EMAIL_NOT_VERIFIED",
            Self::Registration(_) => "E_REGISTRATION",
            Self::PasswordReset(_) => "E_PASSWORD_RESET",
            Self::Token(_) => "E_TOKEN",
            Self::Transport(_) => "E_IDENTITY_TRANSPORT",
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// Any failed backend call: network, timeout, non-2xx, or undecodable body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// No bearer token is available.
    #[error("not signed in")]
    NoSession,

    /// Connection, TLS, or timeout failure before a status was received.
    #[error("request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("server returned status {status}")]
    Status { status: u16, detail: Option<String> },

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),
}

impl RequestError {
    /// Backend-supplied `detail`, if the error response carried one.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Backend detail when present, otherwise the transport-level message.
    #[must_use]
    pub fn detail_or_message(&self) -> String {
        self.detail()
            .map_or_else(|| self.to_string(), ToOwned::to_owned)
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl ErrorCode for RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoSession => "E_NO_SESSION",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Status { status: 401 | 403, .. } => "E_FORBIDDEN",
            Self::Status { status: 404, .. } => "E_NOT_FOUND",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
        }
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Client-side precondition failures. Never reach the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("email is required")]
    MissingEmail,
    #[error("password is required")]
    MissingPassword,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("findings can only be marked discarded or escalated, not {0}")]
    UnsupportedStatus(String),
    #[error("finding {0} is not loaded")]
    UnknownFinding(String),
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingEmail => "E_MISSING_EMAIL",
            Self::MissingPassword => "E_MISSING_PASSWORD",
            Self::MissingField(_) => "E_MISSING_FIELD",
            Self::UnsupportedStatus(_) => "E_UNSUPPORTED_STATUS",
            Self::UnknownFinding(_) => "E_UNKNOWN_FINDING",
        }
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

/// Union returned by component operations that can fail in more than one way.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("file write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ConsoleError {
    /// Text for an alert: backend detail for request failures, the plain
    /// display form for everything else.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Request(err) => err.detail_or_message(),
            Self::Auth(err) => err.message(),
            other => other.to_string(),
        }
    }
}

impl ErrorCode for ConsoleError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Request(e) => e.error_code(),
            Self::Validation(e) => e.error_code(),
            Self::Io(_) => "E_IO",
        }
    }
}
