//! Pure Pomodoro state machine.
//!
//! [`PomodoroTimer`] holds no clock and no task. Every transition is a
//! synchronous method call; the async runner in [`super::runner`] decides
//! when `tick` and `finish_completion` are called.

use super::types::{PomodoroSettings, SessionType, TimerSnapshot, TimerState};
use tracing::debug;

/// In-memory countdown cycling through work and break sessions.
#[derive(Debug, Clone)]
pub struct PomodoroTimer {
    settings: PomodoroSettings,
    session_type: SessionType,
    time_left_secs: u32,
    completed_work_sessions: u32,
    state: TimerState,
}

impl PomodoroTimer {
    /// Create an idle timer at the start of a work session.
    pub fn new(settings: PomodoroSettings) -> Self {
        Self {
            time_left_secs: settings.duration_secs(SessionType::Work),
            settings,
            session_type: SessionType::Work,
            completed_work_sessions: 0,
            state: TimerState::Idle,
        }
    }

    pub fn settings(&self) -> &PomodoroSettings {
        &self.settings
    }

    pub fn session_type(&self) -> SessionType {
        self.session_type
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Full duration of the current session type in seconds.
    pub fn current_duration_secs(&self) -> u32 {
        self.settings.duration_secs(self.session_type)
    }

    /// Copy of the observable state.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            session_type: self.session_type,
            time_left_secs: self.time_left_secs,
            completed_work_sessions: self.completed_work_sessions,
            state: self.state,
            duration_secs: self.current_duration_secs(),
        }
    }

    /// Begin or resume counting. Returns false when the call was a no-op.
    pub fn start(&mut self) -> bool {
        match self.state {
            TimerState::Idle | TimerState::Paused => {
                self.state = TimerState::Running;
                true
            }
            TimerState::Running | TimerState::Completed => false,
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Returns true when this tick finished the session. Ticks outside
    /// the running state are ignored.
    pub fn tick(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        if self.time_left_secs <= 1 {
            self.complete_session();
            return true;
        }
        self.time_left_secs -= 1;
        false
    }

    /// Suspend counting, keeping the remaining time.
    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        true
    }

    /// Return to idle with the full duration of the current session type.
    pub fn stop(&mut self) {
        self.state = TimerState::Idle;
        self.time_left_secs = self.current_duration_secs();
    }

    /// Finish the current session immediately.
    ///
    /// Ignored while a completion is already on display, so one session
    /// can never be counted twice.
    pub fn skip(&mut self) -> bool {
        if self.state == TimerState::Completed {
            return false;
        }
        self.complete_session();
        true
    }

    /// Mark the session finished and pick the next session type.
    ///
    /// The timer stays in [`TimerState::Completed`] with zero time left
    /// until [`finish_completion`](Self::finish_completion) is called.
    pub fn complete_session(&mut self) -> SessionType {
        let finished = self.session_type;
        self.state = TimerState::Completed;
        self.time_left_secs = 0;

        self.session_type = match finished {
            SessionType::Work => {
                self.completed_work_sessions = self.completed_work_sessions.saturating_add(1);
                let every = self.settings.sessions_until_long_break.max(1);
                if self.completed_work_sessions % every == 0 {
                    SessionType::LongBreak
                } else {
                    SessionType::ShortBreak
                }
            }
            SessionType::ShortBreak | SessionType::LongBreak => SessionType::Work,
        };

        debug!(
            finished = %finished,
            next = %self.session_type,
            completed_work_sessions = self.completed_work_sessions,
            "pomodoro session completed"
        );
        finished
    }

    /// End the completion display: back to idle with a full countdown.
    pub fn finish_completion(&mut self) {
        self.state = TimerState::Idle;
        self.time_left_secs = self.current_duration_secs();
    }

    /// Replace the durations.
    ///
    /// An idle timer is rewound to the new duration; otherwise the
    /// remaining time is only clamped so it never exceeds it.
    pub fn set_settings(&mut self, settings: PomodoroSettings) {
        self.settings = settings;
        let full = self.current_duration_secs();
        if self.state == TimerState::Idle {
            self.time_left_secs = full;
        } else {
            self.time_left_secs = self.time_left_secs.min(full);
        }
    }
}

impl Default for PomodoroTimer {
    fn default() -> Self {
        Self::new(PomodoroSettings::default())
    }
}
