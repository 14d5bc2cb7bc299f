// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Expired-session sweep.
//!
//! [`PurgeScheduler::tick`] is the sweep itself and can be called directly.
//! The scheduler hands the same sweep to a [`Ticker`], which decides when
//! it runs: [`ThreadTicker`] on a background thread at a fixed interval,
//! [`ManualTicker`] only when a test calls [`ManualTicker::fire`].

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::events::SecurityEvent;
use super::locks::resilient_lock;
use super::session::SessionStore;
use crate::clock::Clock;

/// Callback a [`Ticker`] invokes on every tick.
pub type TickFn = Arc<dyn Fn() + Send + Sync>;

/// Periodic timer driving the sweep.
pub trait Ticker: Send + Sync {
    /// Invoke `tick` every `interval` until stopped. Replaces any running schedule.
    fn start(&self, interval: Duration, tick: TickFn);

    /// Cancel the schedule. No tick runs after this returns.
    fn stop(&self);

    fn is_active(&self) -> bool;
}

struct Worker {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs the tick on a dedicated thread.
#[derive(Default)]
pub struct ThreadTicker {
    worker: Mutex<Option<Worker>>,
}

impl ThreadTicker {
    pub fn new() -> Self {
        Self::default()
    }

    fn shutdown(worker: Worker) {
        // A send error means the thread has already exited
        let _ = worker.shutdown.send(());
        if worker.handle.join().is_err() {
            tracing::error!(target: "security::purge", "Session purge thread panicked");
        }
    }
}

impl Ticker for ThreadTicker {
    fn start(&self, interval: Duration, tick: TickFn) {
        let mut worker = resilient_lock(&self.worker);
        if let Some(previous) = worker.take() {
            Self::shutdown(previous);
        }

        let (shutdown, signal) = mpsc::channel::<()>();
        let spawned = thread::Builder::new()
            .name("session-purge".to_string())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!(target: "security::purge", interval_ms = interval.as_millis() as u64, "Purge ticker started");
                *worker = Some(Worker { shutdown, handle });
            }
            Err(e) => {
                tracing::error!(target: "security::purge", "Failed to spawn session purge thread: {}", e);
            }
        }
    }

    fn stop(&self) {
        let worker = resilient_lock(&self.worker).take();
        if let Some(worker) = worker {
            Self::shutdown(worker);
            tracing::debug!(target: "security::purge", "Purge ticker stopped");
        }
    }

    fn is_active(&self) -> bool {
        resilient_lock(&self.worker).is_some()
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct ManualState {
    interval: Option<Duration>,
    tick: Option<TickFn>,
}

/// A ticker that only ticks when told to. Clones share state, so a test
/// can keep one handle and give the other to the manager.
#[derive(Clone, Default)]
pub struct ManualTicker {
    state: Arc<Mutex<ManualState>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the registered tick once, synchronously. Returns false when stopped.
    pub fn fire(&self) -> bool {
        let tick = resilient_lock(&self.state).tick.clone();
        match tick {
            Some(tick) => {
                tick();
                true
            }
            None => false,
        }
    }

    /// Interval of the current schedule.
    pub fn interval(&self) -> Option<Duration> {
        resilient_lock(&self.state).interval
    }
}

impl Ticker for ManualTicker {
    fn start(&self, interval: Duration, tick: TickFn) {
        let mut state = resilient_lock(&self.state);
        state.interval = Some(interval);
        state.tick = Some(tick);
    }

    fn stop(&self) {
        let mut state = resilient_lock(&self.state);
        state.interval = None;
        state.tick = None;
    }

    fn is_active(&self) -> bool {
        resilient_lock(&self.state).tick.is_some()
    }
}

/// Sweeps expired sessions out of a [`SessionStore`].
pub struct PurgeScheduler {
    sessions: Arc<SessionStore>,
    clock: Arc<dyn Clock>,
    ticker: Arc<dyn Ticker>,
}

impl PurgeScheduler {
    pub fn new(sessions: Arc<SessionStore>, clock: Arc<dyn Clock>, ticker: Arc<dyn Ticker>) -> Self {
        Self {
            sessions,
            clock,
            ticker,
        }
    }

    /// Remove every session expired at the current instant. Returns the number removed.
    pub fn tick(&self) -> usize {
        Self::sweep(&self.sessions, self.clock.as_ref())
    }

    fn sweep(sessions: &SessionStore, clock: &dyn Clock) -> usize {
        let removed = sessions.purge_expired(clock.now());
        SecurityEvent::SessionsPurged {
            removed,
            remaining: sessions.len(),
        }
        .emit();
        removed
    }

    /// Start sweeping every `interval`.
    pub fn start(&self, interval: Duration) {
        let sessions = Arc::clone(&self.sessions);
        let clock = Arc::clone(&self.clock);
        self.ticker.start(
            interval,
            Arc::new(move || {
                Self::sweep(&sessions, clock.as_ref());
            }),
        );
    }

    pub fn stop(&self) {
        self.ticker.stop();
    }

    pub fn is_active(&self) -> bool {
        self.ticker.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::security::credentials::User;
    use crate::types::Role;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn user(name: &str) -> User {
        User::new(name, name, "user@test.com", "HASH", Role::Reader)
    }

    fn scheduler(ticker: Arc<dyn Ticker>) -> (PurgeScheduler, Arc<SessionStore>, ManualClock) {
        let sessions = Arc::new(SessionStore::new());
        let clock = ManualClock::new();
        let scheduler = PurgeScheduler::new(Arc::clone(&sessions), Arc::new(clock.clone()), ticker);
        (scheduler, sessions, clock)
    }

    #[test]
    fn test_tick_removes_only_expired() {
        let (scheduler, sessions, clock) = scheduler(Arc::new(ManualTicker::new()));
        let length = chrono::Duration::minutes(15);

        sessions.issue_or_resume(&user("first"), clock.now(), length);
        clock.advance(chrono::Duration::minutes(10));
        sessions.issue_or_resume(&user("second"), clock.now(), length);
        clock.advance(chrono::Duration::minutes(6));

        assert_eq!(sessions.len(), 2);
        assert_eq!(scheduler.tick(), 1);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions.snapshot()[0].identity.name, "second");
    }

    #[test]
    fn test_manual_ticker_fire_matches_tick() {
        let ticker = ManualTicker::new();
        let (scheduler, sessions, clock) = scheduler(Arc::new(ticker.clone()));

        sessions.issue_or_resume(&user("first"), clock.now(), chrono::Duration::minutes(1));
        assert!(!ticker.fire());

        scheduler.start(Duration::from_millis(500));
        assert_eq!(ticker.interval(), Some(Duration::from_millis(500)));
        clock.advance(chrono::Duration::minutes(2));
        assert!(ticker.fire());
        assert!(sessions.is_empty());

        scheduler.stop();
        assert!(!scheduler.is_active());
        assert!(!ticker.fire());
    }

    #[test]
    fn test_thread_ticker_runs_and_stops() {
        let ticker = ThreadTicker::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);

        ticker.start(
            Duration::from_millis(10),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(ticker.is_active());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while count.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(count.load(Ordering::SeqCst) >= 2);

        ticker.stop();
        assert!(!ticker.is_active());
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_thread_ticker_restart_replaces_schedule() {
        let ticker = ThreadTicker::new();
        ticker.start(Duration::from_secs(3600), Arc::new(|| {}));
        ticker.start(Duration::from_secs(3600), Arc::new(|| {}));
        assert!(ticker.is_active());
        ticker.stop();
        ticker.stop();
        assert!(!ticker.is_active());
    }
}
