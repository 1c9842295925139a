//! Error taxonomy for session refresh.
//!
//! Every failure is either [`ErrorKind::Transient`] (worth another attempt)
//! or [`ErrorKind::Terminal`] (the session is over). The retry policy is
//! the only consumer of that split; call sites never match on variants
//! to decide whether to retry.

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The server rejected the credential (401/403).
    pub const CREDENTIAL_REJECTED: &str = "CREDENTIAL_REJECTED";

    /// No refresh credential is present locally.
    pub const CREDENTIAL_MISSING: &str = "CREDENTIAL_MISSING";

    /// The request never produced an HTTP response.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";

    /// The server answered with a retryable status (408, 429, 5xx).
    pub const SERVER_ERROR: &str = "SERVER_ERROR";

    /// The server answered with a non-retryable, non-auth status.
    pub const REQUEST_FAILED: &str = "REQUEST_FAILED";

    /// Every attempt allowed by the retry policy failed.
    pub const RETRIES_EXHAUSTED: &str = "RETRIES_EXHAUSTED";
}

/// Whether a failure may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable: network or server trouble.
    Transient,
    /// Unrecoverable: the session must end.
    Terminal,
}

/// Errors produced while renewing the access credential.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The server rejected the credential.
    #[error("[{}] credential rejected (HTTP {status}): {detail}", error_codes::CREDENTIAL_REJECTED)]
    Unauthorized { status: u16, detail: String },

    /// No refresh credential is stored locally.
    #[error("[{}] no refresh credential present", error_codes::CREDENTIAL_MISSING)]
    MissingCredential,

    /// Connection failure or timeout before any response.
    #[error("[{}] {}", error_codes::NETWORK_ERROR, .0)]
    Network(String),

    /// Retryable HTTP status.
    #[error("[{}] HTTP {status}: {detail}", error_codes::SERVER_ERROR)]
    Server { status: u16, detail: String },

    /// Non-retryable HTTP status other than 401/403.
    #[error("[{}] HTTP {status}: {detail}", error_codes::REQUEST_FAILED)]
    Request { status: u16, detail: String },

    /// The retry policy gave up.
    #[error("[{}] gave up after {attempts} attempts: {last}", error_codes::RETRIES_EXHAUSTED)]
    RetriesExhausted { attempts: u32, last: Box<AuthError> },
}

impl AuthError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => error_codes::CREDENTIAL_REJECTED,
            Self::MissingCredential => error_codes::CREDENTIAL_MISSING,
            Self::Network(_) => error_codes::NETWORK_ERROR,
            Self::Server { .. } => error_codes::SERVER_ERROR,
            Self::Request { .. } => error_codes::REQUEST_FAILED,
            Self::RetriesExhausted { .. } => error_codes::RETRIES_EXHAUSTED,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Server { .. } => ErrorKind::Transient,
            Self::Unauthorized { .. }
            | Self::MissingCredential
            | Self::Request { .. }
            | Self::RetriesExhausted { .. } => ErrorKind::Terminal,
        }
    }

    /// Returns true if another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns true if the server explicitly rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else {
            Self::Network(format!("connection error: {e}"))
        }
    }
}

/// Map an HTTP error status and body to a typed error.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> AuthError {
    let detail = extract_error_message(body);
    let code = status.as_u16();

    match code {
        401 | 403 => AuthError::Unauthorized {
            status: code,
            detail,
        },
        408 | 429 => AuthError::Server {
            status: code,
            detail,
        },
        s if s >= 500 => AuthError::Server {
            status: code,
            detail,
        },
        _ => AuthError::Request {
            status: code,
            detail,
        },
    }
}

/// Pull the message out of a JSON error body (`error`, `message`, `msg` or `detail`).
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("msg"))
                .or_else(|| v.get("detail"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}
