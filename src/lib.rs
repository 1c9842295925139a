//! FlowDo client core: Pomodoro timer and session refresh guard.
//!
//! # Architecture
//!
//! Two independent background components, each owned through a handle
//! whose drop stops the underlying tokio task:
//! - **Pomodoro**: [`pomodoro::TimerHandle`] drives a [`pomodoro::PomodoroTimer`]
//!   with a one-second tick, cycling work, short-break and long-break sessions
//! - **Auth guard**: [`auth::AuthGuard`] renews the access credential every
//!   twelve minutes, retries transient failures, and forces a logout when
//!   the session cannot be kept

pub mod auth;
pub mod config;
pub mod error;
pub mod pomodoro;

pub use auth::{AuthEvent, AuthGuard, AuthGuardHandle, AuthStatus, CredentialStore};
pub use config::FlowdoConfig;
pub use error::{FlowdoError, Result};
pub use pomodoro::{PomodoroSettings, PomodoroTimer, SessionType, TimerHandle, TimerState};
