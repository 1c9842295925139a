//! Error types for the flowdo client.

use crate::auth::AuthError;
use crate::pomodoro::TimerError;

/// Top-level error type for the timer and auth guard.
#[derive(Debug, thiserror::Error)]
pub enum FlowdoError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session refresh or credential error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Pomodoro runner error.
    #[error(transparent)]
    Timer(#[from] TimerError),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, FlowdoError>;
