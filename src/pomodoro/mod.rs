//! Pomodoro countdown cycling through work, short-break and long-break sessions.
//!
//! [`PomodoroTimer`] is the synchronous state machine; [`TimerHandle`]
//! runs one on a tokio task with a one-second tick.

pub mod runner;
pub mod timer;
pub mod types;

pub use runner::{RunnerTiming, TimerError, TimerHandle};
pub use timer::PomodoroTimer;
pub use types::{
    PomodoroSettings, SessionType, TimerEvent, TimerSnapshot, TimerState, format_time,
};
