//! Session refresh guard.
//!
//! Keeps cookie-based auth alive: scheduled renewal against the backend's
//! refresh route, bounded retry on transient failures, and a forced
//! logout (credentials cleared, redirect to login) on anything terminal.

pub mod client;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod retry;
pub mod token;

pub use client::{HttpRefreshConfig, HttpTokenRefresher, RefreshOutcome, TokenRefresher};
pub use credentials::{CredentialStore, TokenKind};
pub use error::{AuthError, ErrorKind, map_http_error};
pub use guard::{
    AuthEvent, AuthGuard, AuthGuardHandle, AuthSignal, AuthSignaller, AuthStatus, GuardSettings,
    LogoutReason,
};
pub use retry::RetryPolicy;
pub use token::{TokenValidation, validate_access_token};
