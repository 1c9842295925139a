//! Pomodoro runner end-to-end tests on a paused clock.

use flowdo::pomodoro::{
    PomodoroSettings, RunnerTiming, SessionType, TimerEvent, TimerHandle, TimerState,
};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

fn short_settings() -> PomodoroSettings {
    PomodoroSettings {
        work_duration: 1,
        short_break_duration: 1,
        long_break_duration: 2,
        sessions_until_long_break: 2,
    }
}

async fn next_completion(events: &mut UnboundedReceiver<TimerEvent>) -> (SessionType, SessionType, u32) {
    loop {
        match events.recv().await {
            Some(TimerEvent::SessionCompleted {
                finished,
                next,
                completed_work_sessions,
            }) => return (finished, next, completed_work_sessions),
            Some(_) => continue,
            None => panic!("timer task ended"),
        }
    }
}

async fn next_ready(events: &mut UnboundedReceiver<TimerEvent>) -> (SessionType, u32) {
    loop {
        match events.recv().await {
            Some(TimerEvent::Ready {
                session_type,
                time_left_secs,
            }) => return (session_type, time_left_secs),
            Some(_) => continue,
            None => panic!("timer task ended"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn one_minute_work_session_completes_after_sixty_ticks() {
    let (timer, mut events) = TimerHandle::spawn(short_settings(), RunnerTiming::default());
    let start = Instant::now();

    let snap = timer.start().await.expect("timer alive");
    assert_eq!(snap.state, TimerState::Running);
    assert_eq!(snap.time_left_secs, 60);

    let (finished, next, count) = next_completion(&mut events).await;
    assert_eq!(start.elapsed(), Duration::from_secs(60));
    assert_eq!((finished, next, count), (SessionType::Work, SessionType::ShortBreak, 1));

    let snap = timer.snapshot();
    assert_eq!(snap.state, TimerState::Completed);
    assert_eq!(snap.time_left_secs, 0);

    let (session, time_left) = next_ready(&mut events).await;
    assert_eq!(start.elapsed(), Duration::from_secs(62));
    assert_eq!((session, time_left), (SessionType::ShortBreak, 60));
    assert_eq!(timer.snapshot().state, TimerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn full_cycle_reaches_long_break_and_returns_to_work() {
    let (timer, mut events) = TimerHandle::spawn(short_settings(), RunnerTiming::default());
    let expected = [
        (SessionType::Work, SessionType::ShortBreak, 1, 60),
        (SessionType::ShortBreak, SessionType::Work, 1, 60),
        (SessionType::Work, SessionType::LongBreak, 2, 120),
        (SessionType::LongBreak, SessionType::Work, 2, 60),
    ];

    for (finished, next, count, next_secs) in expected {
        timer.start().await.expect("timer alive");
        assert_eq!(next_completion(&mut events).await, (finished, next, count));
        assert_eq!(next_ready(&mut events).await, (next, next_secs));
    }
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_the_countdown() {
    let (timer, _events) = TimerHandle::spawn(short_settings(), RunnerTiming::default());

    timer.start().await.expect("timer alive");
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let paused = timer.pause().await.expect("timer alive");
    assert_eq!(paused.state, TimerState::Paused);
    assert_eq!(paused.time_left_secs, 50);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(timer.snapshot().time_left_secs, 50);

    timer.start().await.expect("timer alive");
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(timer.snapshot().time_left_secs, 45);
}

#[tokio::test(start_paused = true)]
async fn skip_then_stop_cancels_pending_reset() {
    let (timer, mut events) = TimerHandle::spawn(short_settings(), RunnerTiming::default());

    timer.start().await.expect("timer alive");
    let skipped = timer.skip().await.expect("timer alive");
    assert_eq!(skipped.state, TimerState::Completed);
    assert_eq!(skipped.session_type, SessionType::ShortBreak);
    assert_eq!(skipped.completed_work_sessions, 1);

    let stopped = timer.stop().await.expect("timer alive");
    assert_eq!(stopped.state, TimerState::Idle);
    assert_eq!(stopped.time_left_secs, 60);

    tokio::time::sleep(Duration::from_secs(5)).await;
    while let Ok(event) = events.try_recv() {
        assert!(!matches!(event, TimerEvent::Ready { .. }), "reset should be cancelled");
    }
    assert_eq!(timer.snapshot().state, TimerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_task() {
    let (timer, mut events) = TimerHandle::spawn(short_settings(), RunnerTiming::default());
    timer.start().await.expect("timer alive");
    drop(timer);
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Drain what was sent before the abort; the channel then closes.
    while events.recv().await.is_some() {}
}
