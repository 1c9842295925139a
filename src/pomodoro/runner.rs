//! Background driver for the Pomodoro timer.
//!
//! [`TimerHandle::spawn`] moves a [`PomodoroTimer`] into a tokio task that
//! owns the one-second tick interval and the completion display delay.
//! Callers talk to the task through the handle; dropping the handle
//! aborts the task and with it every pending tick.

use super::timer::PomodoroTimer;
use super::types::{PomodoroSettings, SessionType, TimerEvent, TimerSnapshot, TimerState};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Interval between countdown ticks (milliseconds).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// How long a completed session stays on display before the reset (milliseconds).
pub const DEFAULT_COMPLETION_DISPLAY_DELAY_MS: u64 = 2_000;

/// Shortest tick period the runner accepts; smaller values are raised to it.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Errors surfaced by [`TimerHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The runner task has exited or was aborted.
    #[error("pomodoro timer task is no longer running")]
    Closed,
}

/// Clock parameters for the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerTiming {
    /// Period of the countdown tick.
    pub tick_interval: Duration,
    /// Delay between completion and the idle reset.
    pub completion_display_delay: Duration,
}

impl Default for RunnerTiming {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            completion_display_delay: Duration::from_millis(DEFAULT_COMPLETION_DISPLAY_DELAY_MS),
        }
    }
}

#[derive(Debug)]
enum Command {
    Start,
    Pause,
    Stop,
    Skip,
    SetSettings(PomodoroSettings),
}

struct Request {
    command: Command,
    reply: oneshot::Sender<TimerSnapshot>,
}

/// Owning handle to a running Pomodoro timer task.
pub struct TimerHandle {
    commands: mpsc::UnboundedSender<Request>,
    snapshots: watch::Receiver<TimerSnapshot>,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Spawn the timer task on the current tokio runtime.
    ///
    /// Returns the handle and the receiving end of the event stream.
    /// Events are dropped silently once the receiver is gone.
    pub fn spawn(
        settings: PomodoroSettings,
        timing: RunnerTiming,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let timer = PomodoroTimer::new(settings);
        let (snapshot_tx, snapshot_rx) = watch::channel(timer.snapshot());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let task = TimerTask {
            timer,
            timing,
            ticker: None,
            completion_deadline: None,
            snapshots: snapshot_tx,
            events: event_tx,
        };
        let task = tokio::spawn(task.run(command_rx));

        (
            Self {
                commands: command_tx,
                snapshots: snapshot_rx,
                task,
            },
            event_rx,
        )
    }

    pub async fn start(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(Command::Start).await
    }

    pub async fn pause(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(Command::Stop).await
    }

    pub async fn skip(&self) -> Result<TimerSnapshot, TimerError> {
        self.request(Command::Skip).await
    }

    pub async fn set_settings(
        &self,
        settings: PomodoroSettings,
    ) -> Result<TimerSnapshot, TimerError> {
        self.request(Command::SetSettings(settings)).await
    }

    /// Latest published state.
    pub fn snapshot(&self) -> TimerSnapshot {
        *self.snapshots.borrow()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    /// Returns true while the runner task is alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn request(&self, command: Command) -> Result<TimerSnapshot, TimerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Request { command, reply })
            .map_err(|_| TimerError::Closed)?;
        response.await.map_err(|_| TimerError::Closed)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct TimerTask {
    timer: PomodoroTimer,
    timing: RunnerTiming,
    /// Present only while the timer is running.
    ticker: Option<Interval>,
    /// Present only while a completion is on display.
    completion_deadline: Option<Instant>,
    snapshots: watch::Sender<TimerSnapshot>,
    events: mpsc::UnboundedSender<TimerEvent>,
}

impl TimerTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Request>) {
        debug!("pomodoro timer task started");
        loop {
            tokio::select! {
                biased;

                request = commands.recv() => {
                    let Some(Request { command, reply }) = request else {
                        debug!("pomodoro timer handle dropped, stopping task");
                        break;
                    };
                    self.apply(command);
                    self.publish();
                    let _ = reply.send(self.timer.snapshot());
                }
                _ = next_tick(&mut self.ticker) => {
                    self.on_tick();
                    self.publish();
                }
                _ = deadline_elapsed(self.completion_deadline) => {
                    self.on_completion_elapsed();
                    self.publish();
                }
            }
        }
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, state = %self.timer.state(), "pomodoro command");
        match command {
            Command::Start => {
                if self.timer.start() {
                    self.arm_ticker();
                    self.emit(TimerEvent::Started {
                        session_type: self.timer.session_type(),
                        time_left_secs: self.timer.time_left_secs(),
                    });
                }
            }
            Command::Pause => {
                if self.timer.pause() {
                    self.ticker = None;
                    self.emit(TimerEvent::Paused {
                        time_left_secs: self.timer.time_left_secs(),
                    });
                }
            }
            Command::Stop => {
                self.timer.stop();
                self.ticker = None;
                self.completion_deadline = None;
                self.emit(TimerEvent::Stopped {
                    session_type: self.timer.session_type(),
                });
            }
            Command::Skip => {
                let finished = self.timer.session_type();
                if self.timer.skip() {
                    self.ticker = None;
                    self.begin_completion(finished);
                }
            }
            Command::SetSettings(settings) => self.timer.set_settings(settings),
        }
    }

    fn on_tick(&mut self) {
        let finished = self.timer.session_type();
        if self.timer.tick() {
            self.ticker = None;
            self.begin_completion(finished);
        }
    }

    fn begin_completion(&mut self, finished: SessionType) {
        self.completion_deadline = Some(Instant::now() + self.timing.completion_display_delay);
        info!(
            finished = %finished,
            next = %self.timer.session_type(),
            completed_work_sessions = self.timer.completed_work_sessions(),
            "pomodoro session completed"
        );
        self.emit(TimerEvent::SessionCompleted {
            finished,
            next: self.timer.session_type(),
            completed_work_sessions: self.timer.completed_work_sessions(),
        });
    }

    fn on_completion_elapsed(&mut self) {
        self.completion_deadline = None;
        if self.timer.state() != TimerState::Completed {
            return;
        }
        self.timer.finish_completion();
        self.emit(TimerEvent::Ready {
            session_type: self.timer.session_type(),
            time_left_secs: self.timer.time_left_secs(),
        });
    }

    /// First tick fires one full period after arming.
    fn arm_ticker(&mut self) {
        let period = self.timing.tick_interval.max(MIN_TICK_INTERVAL);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(interval);
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.timer.snapshot());
    }

    fn emit(&self, event: TimerEvent) {
        let _ = self.events.send(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn spawn_default() -> (TimerHandle, mpsc::UnboundedReceiver<TimerEvent>) {
        TimerHandle::spawn(PomodoroSettings::default(), RunnerTiming::default())
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_does_not_tick() {
        let (handle, _events) = spawn_default();
        tokio::time::sleep(secs(10)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.time_left_secs, 25 * 60);
    }

    #[tokio::test(start_paused = true)]
    async fn running_timer_counts_down_once_per_second() {
        let (handle, _events) = spawn_default();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(handle.snapshot().time_left_secs, 25 * 60 - 10);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_timer_keeps_remaining_time() {
        let (handle, _events) = spawn_default();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let paused = handle.pause().await.unwrap();
        assert_eq!(paused.state, TimerState::Paused);
        assert_eq!(paused.time_left_secs, 25 * 60 - 5);

        tokio::time::sleep(secs(30)).await;
        assert_eq!(handle.snapshot().time_left_secs, 25 * 60 - 5);

        let resumed = handle.start().await.unwrap();
        assert_eq!(resumed.time_left_secs, 25 * 60 - 5);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_enters_completion_then_resets_after_delay() {
        let (handle, mut events) = spawn_default();
        let snap = handle.skip().await.unwrap();
        assert_eq!(snap.state, TimerState::Completed);
        assert_eq!(snap.session_type, SessionType::ShortBreak);

        tokio::time::sleep(Duration::from_millis(2_100)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.time_left_secs, 5 * 60);

        assert_eq!(
            events.recv().await,
            Some(TimerEvent::SessionCompleted {
                finished: SessionType::Work,
                next: SessionType::ShortBreak,
                completed_work_sessions: 1,
            })
        );
        assert_eq!(
            events.recv().await,
            Some(TimerEvent::Ready {
                session_type: SessionType::ShortBreak,
                time_left_secs: 300,
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_completion_cancels_the_reset() {
        let (handle, _events) = spawn_default();
        handle.skip().await.unwrap();
        let snap = handle.stop().await.unwrap();
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.time_left_secs, 5 * 60);

        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let snap = handle.snapshot();
        assert_eq!(snap.state, TimerState::Running);
        assert_eq!(snap.time_left_secs, 5 * 60 - 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_aborts_the_task() {
        let (handle, mut events) = spawn_default();
        handle.start().await.unwrap();
        assert!(matches!(events.recv().await, Some(TimerEvent::Started { .. })));
        drop(handle);
        // The event sender lives in the task, so the stream ends once it is gone.
        let next = tokio::time::timeout(secs(5), events.recv()).await;
        assert_eq!(next.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_tick_interval_is_clamped() {
        let timing = RunnerTiming {
            tick_interval: Duration::ZERO,
            ..RunnerTiming::default()
        };
        let (handle, _events) = TimerHandle::spawn(PomodoroSettings::default(), timing);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_running());
        let snap = handle.stop().await.unwrap();
        assert_eq!(snap.state, TimerState::Idle);
    }
}
