//! Core types for the Pomodoro timer.

use serde::{Deserialize, Serialize};

/// Phase of the Pomodoro cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    /// Focused work.
    Work,
    /// Break after a work session that is not a long-break multiple.
    ShortBreak,
    /// Break after every `sessions_until_long_break` work sessions.
    LongBreak,
}

impl SessionType {
    /// Human-facing label shown next to the countdown.
    pub fn label(self) -> &'static str {
        match self {
            Self::Work => "Focus Time",
            Self::ShortBreak => "Short Break",
            Self::LongBreak => "Long Break",
        }
    }

    /// Returns true for either break type.
    pub fn is_break(self) -> bool {
        !matches!(self, Self::Work)
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Work => "work",
            Self::ShortBreak => "short_break",
            Self::LongBreak => "long_break",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Not counting; `time_left_secs` holds the full session duration.
    Idle,
    /// Counting down once per tick.
    Running,
    /// Counting suspended; `time_left_secs` preserved.
    Paused,
    /// A session just finished; waiting out the display delay.
    Completed,
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// User-adjustable durations, all in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PomodoroSettings {
    /// Length of a work session in minutes.
    pub work_duration: u32,
    /// Length of a short break in minutes.
    pub short_break_duration: u32,
    /// Length of a long break in minutes.
    pub long_break_duration: u32,
    /// Completed work sessions between long breaks.
    pub sessions_until_long_break: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            sessions_until_long_break: 4,
        }
    }
}

impl PomodoroSettings {
    /// Full duration of `session` in seconds.
    pub fn duration_secs(&self, session: SessionType) -> u32 {
        let minutes = match session {
            SessionType::Work => self.work_duration,
            SessionType::ShortBreak => self.short_break_duration,
            SessionType::LongBreak => self.long_break_duration,
        };
        minutes.saturating_mul(60)
    }

    /// Check that every field is usable by the timer.
    ///
    /// Zero-length sessions would complete without ticking and a zero
    /// long-break interval has no multiples, so both are rejected.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("work_duration", self.work_duration),
            ("short_break_duration", self.short_break_duration),
            ("long_break_duration", self.long_break_duration),
            ("sessions_until_long_break", self.sessions_until_long_break),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(format!("{name} must be at least 1"));
            }
        }
        if self.work_duration > MAX_SESSION_MINUTES
            || self.short_break_duration > MAX_SESSION_MINUTES
            || self.long_break_duration > MAX_SESSION_MINUTES
        {
            return Err(format!(
                "session durations must not exceed {MAX_SESSION_MINUTES} minutes"
            ));
        }
        Ok(())
    }
}

/// Upper bound on any single session (minutes).
pub const MAX_SESSION_MINUTES: u32 = 24 * 60;

/// Observable copy of the timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    /// Current or upcoming session type.
    pub session_type: SessionType,
    /// Remaining seconds in the current session.
    pub time_left_secs: u32,
    /// Work sessions completed since the timer was created.
    pub completed_work_sessions: u32,
    /// Countdown lifecycle state.
    pub state: TimerState,
    /// Full duration of `session_type` in seconds.
    pub duration_secs: u32,
}

impl TimerSnapshot {
    /// Percentage of the session already elapsed, in `[0, 100]`.
    pub fn progress(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        let elapsed = self.duration_secs.saturating_sub(self.time_left_secs);
        f64::from(elapsed) / f64::from(self.duration_secs) * 100.0
    }

    /// Remaining time as `MM:SS`.
    pub fn formatted_time(&self) -> String {
        format_time(self.time_left_secs)
    }
}

/// Notifications emitted by the timer runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Countdown started or resumed.
    Started {
        session_type: SessionType,
        time_left_secs: u32,
    },
    /// Countdown paused.
    Paused { time_left_secs: u32 },
    /// Countdown stopped and rewound.
    Stopped { session_type: SessionType },
    /// A session ran out or was skipped.
    SessionCompleted {
        finished: SessionType,
        next: SessionType,
        completed_work_sessions: u32,
    },
    /// Display delay elapsed; the next session is ready to start.
    Ready {
        session_type: SessionType,
        time_left_secs: u32,
    },
}

/// Format seconds as zero-padded `MM:SS`.
///
/// Minutes are not wrapped at 60, so a 90 minute session reads `90:00`.
pub fn format_time(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
