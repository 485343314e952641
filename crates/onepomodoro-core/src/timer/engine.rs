//! Session engine implementation.
//!
//! The engine is a wall-clock-based state machine over [`SessionPhase`]. It
//! does not use internal threads and never reads the system time: every
//! operation takes `now`, and the caller drives `tick()` while the host is in
//! the foreground.
//!
//! Remaining time is derived from the persisted absolute end timestamp, so a
//! process that was suspended for an arbitrary gap picks up exactly where the
//! wall clock says it should be.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start_work--> Working --stop_work/complete_work--> Paused
//! Paused --start_rest--> Resting --complete_rest--> Idle
//! Paused --start_work--> Working
//! any --reset--> Idle
//! ```
//!
//! Operations whose precondition does not hold are no-ops returning `None`.
//! Each accepted transition updates the pending alert and is written to the
//! store before the call returns.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::state::{positive_or, Durations, SessionPhase, SessionState};
use crate::error::Result;
use crate::events::{Event, SessionSnapshot};
use crate::notify::{AlertKind, NotificationCoordinator, Notifier};
use crate::storage::{KeyValueStore, PersistedSession, SessionStore};

/// Longest interval the engine will run.
pub const MAX_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Core session engine.
pub struct SessionEngine<S, N> {
    state: SessionState,
    durations: Durations,
    store: SessionStore<S>,
    alerts: NotificationCoordinator<N>,
}

impl<S: KeyValueStore, N: Notifier> SessionEngine<S, N> {
    /// Create a fresh engine in `Idle` without reading the store.
    pub fn new(store: S, notifier: N, durations: Durations) -> Self {
        Self {
            state: SessionState::stopped(SessionPhase::Idle, durations.work_secs),
            durations,
            store: SessionStore::new(store),
            alerts: NotificationCoordinator::new(notifier, durations.pause_minutes()),
        }
    }

    /// Create an engine and reconstruct it from the store at `now`.
    pub fn restore(
        store: S,
        notifier: N,
        durations: Durations,
        now: DateTime<Utc>,
    ) -> Result<(Self, Option<Event>)> {
        let mut engine = Self::new(store, notifier, durations);
        let event = engine.reconstruct(now)?;
        Ok((engine, event))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    pub fn durations(&self) -> Durations {
        self.durations
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        self.state.remaining_secs(now)
    }

    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        self.state.progress(now)
    }

    /// The alert the coordinator holds pending.
    pub fn pending_alert(&self) -> Option<AlertKind> {
        self.alerts.pending()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.state.phase(),
            remaining_secs: self.state.remaining_secs(now),
            total_secs: self.state.total_duration_secs(),
            progress: self.state.progress(now),
            ends_at: self.state.ends_at(),
            at: now,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Adopt new configured durations. An idle session shows the new work
    /// length; a running interval keeps its end timestamp.
    pub fn set_durations(&mut self, durations: Durations) -> Result<()> {
        self.durations = durations;
        self.alerts.set_pause_minutes(durations.pause_minutes());
        if self.state.phase() == SessionPhase::Idle {
            self.state = SessionState::stopped(SessionPhase::Idle, durations.work_secs);
            self.persist()?;
        }
        Ok(())
    }

    /// Start a work interval. Non-positive `duration_secs` uses the configured
    /// work length.
    pub fn start_work(&mut self, now: DateTime<Utc>, duration_secs: i64) -> Result<Option<Event>> {
        match self.state.phase() {
            SessionPhase::Idle | SessionPhase::Paused => {
                let secs = self.interval(duration_secs, self.durations.work_secs);
                let ends_at = self.begin(SessionPhase::Working, now, secs)?;
                info!(duration_secs = secs, "work started");
                Ok(Some(Event::WorkStarted {
                    duration_secs: secs,
                    ends_at,
                    at: now,
                }))
            }
            phase => self.ignored("start_work", phase),
        }
    }

    /// Stop a running work interval early.
    pub fn stop_work(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        match self.state.phase() {
            SessionPhase::Working => {
                let remaining_secs = self.state.remaining_secs(now);
                self.finish(SessionPhase::Paused)?;
                info!(remaining_secs, "work stopped");
                Ok(Some(Event::WorkStopped {
                    remaining_secs,
                    at: now,
                }))
            }
            phase => self.ignored("stop_work", phase),
        }
    }

    /// The work interval ran out.
    pub fn complete_work(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        match self.state.phase() {
            SessionPhase::Working => {
                let duration_secs = self.state.total_duration_secs();
                self.finish(SessionPhase::Paused)?;
                info!(duration_secs, "work completed");
                Ok(Some(Event::WorkCompleted {
                    duration_secs,
                    at: now,
                }))
            }
            phase => self.ignored("complete_work", phase),
        }
    }

    /// Start a rest interval, from `Paused` or once a running rest has
    /// expired. Non-positive `duration_secs` uses the configured pause length.
    pub fn start_rest(&mut self, now: DateTime<Utc>, duration_secs: i64) -> Result<Option<Event>> {
        let allowed = match self.state.phase() {
            SessionPhase::Paused => true,
            SessionPhase::Resting => self.state.remaining_secs(now) == 0,
            _ => false,
        };
        if !allowed {
            return self.ignored("start_rest", self.state.phase());
        }

        let secs = self.interval(duration_secs, self.durations.pause_secs);
        let ends_at = self.begin(SessionPhase::Resting, now, secs)?;
        info!(duration_secs = secs, "rest started");
        Ok(Some(Event::RestStarted {
            duration_secs: secs,
            ends_at,
            at: now,
        }))
    }

    /// Take the configured short break after an unfinished work interval.
    pub fn start_short_break(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        let secs = self.durations.pause_secs as i64;
        self.start_rest(now, secs)
    }

    /// The task is done: take the configured long rest.
    pub fn complete_task(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        if self.state.phase() != SessionPhase::Paused {
            return self.ignored("complete_task", self.state.phase());
        }
        let secs = self.durations.rest_secs as i64;
        self.start_rest(now, secs)
    }

    /// End the rest, either because it ran out or because the user ended it.
    pub fn complete_rest(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        match self.state.phase() {
            SessionPhase::Resting => {
                let early = self.state.remaining_secs(now) > 0;
                self.finish(SessionPhase::Idle)?;
                info!(early, "rest completed");
                Ok(Some(Event::RestCompleted { early, at: now }))
            }
            phase => self.ignored("complete_rest", phase),
        }
    }

    /// Back to `Idle` from any phase.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        let from = self.state.phase();
        self.finish(SessionPhase::Idle)?;
        info!(?from, "session reset");
        Ok(Some(Event::SessionReset { from, at: now }))
    }

    /// Recompute remaining time; auto-complete the interval once it hits zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        let phase = self.state.phase();
        if !phase.is_running() {
            return Ok(None);
        }

        let remaining = self.state.remaining_secs(now);
        debug!(?phase, remaining, "tick");
        if remaining > 0 {
            return Ok(None);
        }
        match phase {
            SessionPhase::Working => self.complete_work(now),
            SessionPhase::Resting => self.complete_rest(now),
            SessionPhase::Idle | SessionPhase::Paused => Ok(None),
        }
    }

    /// Replace the in-memory state with what the store says, as of `now`.
    ///
    /// An interval that is still running resumes (its alert is re-armed for
    /// the time left). One that expired while nobody was ticking gets the
    /// same terminal transition the tick would have applied: expired work
    /// pauses, expired rest resets to `Idle`.
    pub fn reconstruct(&mut self, now: DateTime<Utc>) -> Result<Option<Event>> {
        let persisted = match self.store.load() {
            Ok(p) => p,
            Err(e) => {
                warn!("could not read persisted session, starting fresh: {e}");
                PersistedSession::Idle
            }
        };

        match persisted {
            PersistedSession::Idle => {
                self.state = SessionState::stopped(SessionPhase::Idle, self.durations.work_secs);
                self.alerts.cancel_all();
                self.persist()?;
                Ok(None)
            }
            PersistedSession::Paused { total_secs } => {
                let total = total_secs.unwrap_or(self.durations.work_secs);
                self.state = SessionState::stopped(SessionPhase::Paused, total);
                self.alerts.cancel_all();
                self.persist()?;
                info!("restored paused session");
                Ok(Some(Event::SessionRestored {
                    phase: SessionPhase::Paused,
                    remaining_secs: 0,
                    at: now,
                }))
            }
            PersistedSession::Running {
                is_rest,
                ends_at,
                started_at,
            } => {
                let phase = if is_rest {
                    SessionPhase::Resting
                } else {
                    SessionPhase::Working
                };
                // Without a start stamp a live interval is taken to span
                // [now, end); an expired one gets the configured length.
                let started_at = started_at.unwrap_or_else(|| {
                    if now < ends_at {
                        now
                    } else {
                        let fallback = match phase {
                            SessionPhase::Resting => self.durations.pause_secs,
                            _ => self.durations.work_secs,
                        };
                        ends_at - Duration::seconds(fallback as i64)
                    }
                });
                self.state = SessionState::running(phase, started_at, ends_at);

                let remaining = self.state.remaining_secs(now);
                if remaining == 0 {
                    info!(?phase, "persisted interval expired while suspended");
                    return self.tick(now);
                }

                if let Some(kind) = AlertKind::for_phase(phase) {
                    self.alerts.schedule_end(kind, remaining);
                }
                self.persist()?;
                info!(?phase, remaining, "restored running session");
                Ok(Some(Event::SessionRestored {
                    phase,
                    remaining_secs: remaining,
                    at: now,
                }))
            }
        }
    }

    /// Write the current state to the store.
    pub fn persist(&self) -> Result<()> {
        self.store.save(&self.state)?;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn interval(&self, requested: i64, fallback: u64) -> u64 {
        let secs = positive_or(requested, fallback);
        if secs > MAX_INTERVAL_SECS {
            warn!(requested = secs, "interval too long, capping");
        }
        secs.min(MAX_INTERVAL_SECS)
    }

    /// Enter a running phase lasting `secs` from `now`.
    fn begin(&mut self, phase: SessionPhase, now: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
        let ends_at = now + Duration::seconds(secs as i64);
        self.state = SessionState::running(phase, now, ends_at);
        if let Some(kind) = AlertKind::for_phase(phase) {
            self.alerts.schedule_end(kind, secs);
        }
        self.persist()?;
        Ok(ends_at)
    }

    /// Leave the running phase (if any) for a stopped one.
    ///
    /// `Paused` keeps the length of the interval that just ended; `Idle`
    /// restores the configured work length.
    fn finish(&mut self, next: SessionPhase) -> Result<()> {
        let total = match next {
            SessionPhase::Paused => self.state.total_duration_secs(),
            _ => self.durations.work_secs,
        };
        self.state = SessionState::stopped(next, total);
        self.alerts.cancel_all();
        self.persist()
    }

    fn ignored(&self, op: &str, phase: SessionPhase) -> Result<Option<Event>> {
        debug!(op, ?phase, "operation not valid in this phase, ignoring");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::notify::RecordingNotifier;
    use crate::storage::MemoryStore;

    type TestEngine = SessionEngine<Arc<MemoryStore>, RecordingNotifier>;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn engine() -> (TestEngine, Arc<MemoryStore>, RecordingNotifier) {
        let store = Arc::new(MemoryStore::new());
        let notifier = RecordingNotifier::new();
        let engine = SessionEngine::new(Arc::clone(&store), notifier.clone(), Durations::default());
        (engine, store, notifier)
    }

    fn restored(store: &Arc<MemoryStore>, now: DateTime<Utc>) -> (TestEngine, RecordingNotifier) {
        let notifier = RecordingNotifier::new();
        let (engine, _) =
            SessionEngine::restore(Arc::clone(store), notifier.clone(), Durations::default(), now)
                .unwrap();
        (engine, notifier)
    }

    #[test]
    fn fresh_engine_is_idle_with_default_work() {
        let (engine, _, notifier) = engine();
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert_eq!(engine.state().total_duration_secs(), 25 * 60);
        assert_eq!(engine.progress(at(0)), 0.0);
        assert!(notifier.pending().is_empty());
    }

    #[test]
    fn scenario_work_ticks_down_then_pauses() {
        let (mut engine, _, notifier) = engine();
        let event = engine.start_work(at(0), 1500).unwrap();
        assert!(matches!(event, Some(Event::WorkStarted { duration_secs: 1500, .. })));
        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(notifier.pending()[0].fire_after_secs, 1500);

        assert!(engine.tick(at(900)).unwrap().is_none());
        assert_eq!(engine.remaining_secs(at(900)), 600);
        assert_eq!(engine.phase(), SessionPhase::Working);

        let event = engine.tick(at(1500)).unwrap();
        assert!(matches!(event, Some(Event::WorkCompleted { duration_secs: 1500, .. })));
        assert_eq!(engine.phase(), SessionPhase::Paused);
        assert!(notifier.pending().is_empty());
        assert_eq!(engine.pending_alert(), None);
        assert_eq!(engine.state().total_duration_secs(), 1500);
    }

    #[test]
    fn scenario_rest_expires_while_suspended() {
        let (mut engine, store, _) = engine();
        engine.start_work(at(0), 1500).unwrap();
        engine.stop_work(at(10)).unwrap();
        engine.start_rest(at(100), 300).unwrap();
        assert_eq!(engine.phase(), SessionPhase::Resting);
        drop(engine);

        let (engine, notifier) = restored(&store, at(700));
        assert_eq!(engine.phase(), SessionPhase::Idle);
        assert_eq!(engine.state().total_duration_secs(), 25 * 60);
        assert!(notifier.pending().is_empty());
    }

    #[test]
    fn scenario_reset_from_every_phase() {
        for setup in 0..4 {
            let (mut engine, store, notifier) = engine();
            match setup {
                0 => {}
                1 => {
                    engine.start_work(at(0), 60).unwrap();
                }
                2 => {
                    engine.start_work(at(0), 60).unwrap();
                    engine.stop_work(at(1)).unwrap();
                }
                _ => {
                    engine.start_work(at(0), 60).unwrap();
                    engine.stop_work(at(1)).unwrap();
                    engine.start_rest(at(2), 60).unwrap();
                }
            }
            let event = engine.reset(at(5)).unwrap();
            assert!(matches!(event, Some(Event::SessionReset { .. })));
            assert_eq!(engine.phase(), SessionPhase::Idle);
            assert!(engine.state().ends_at().is_none());
            assert!(engine.state().started_at().is_none());
            assert_eq!(engine.state().total_duration_secs(), 25 * 60);
            assert!(notifier.pending().is_empty());
            assert_eq!(store.get("session.isRunning").unwrap().as_deref(), Some("false"));
        }
    }

    #[test]
    fn round_trip_expired_work_pauses() {
        let (mut engine, store, _) = engine();
        engine.start_work(at(0), 1500).unwrap();

        let (engine, notifier) = restored(&store, at(1500));
        assert_eq!(engine.phase(), SessionPhase::Paused);
        assert_eq!(engine.remaining_secs(at(1500)), 0);
        assert_eq!(engine.state().total_duration_secs(), 1500);
        assert!(notifier.pending().is_empty());
    }

    #[test]
    fn restore_running_rearms_alert() {
        let (mut engine, store, _) = engine();
        engine.start_work(at(0), 1500).unwrap();

        let notifier = RecordingNotifier::new();
        let (engine, event) =
            SessionEngine::restore(Arc::clone(&store), notifier.clone(), Durations::default(), at(600))
                .unwrap();
        assert_eq!(engine.phase(), SessionPhase::Working);
        assert_eq!(engine.remaining_secs(at(600)), 900);
        assert!((engine.progress(at(600)) - 0.4).abs() < 1e-9);
        assert!(matches!(
            event,
            Some(Event::SessionRestored {
                phase: SessionPhase::Working,
                remaining_secs: 900,
                ..
            })
        ));
        assert_eq!(notifier.pending().len(), 1);
        assert_eq!(notifier.pending()[0].fire_after_secs, 900);
    }

    #[test]
    fn paused_survives_restart() {
        let (mut engine, store, _) = engine();
        engine.start_work(at(0), 1200).unwrap();
        engine.stop_work(at(300)).unwrap();

        let (mut engine, _) = restored(&store, at(5000));
        assert_eq!(engine.phase(), SessionPhase::Paused);
        assert_eq!(engine.state().total_duration_secs(), 1200);
        assert!(engine.start_short_break(at(5000)).unwrap().is_some());
    }

    #[test]
    fn malformed_store_starts_fresh() {
        let store = Arc::new(MemoryStore::new());
        store.set("session.isRunning", "true").unwrap();
        store.set("session.endTimestamp", "tomorrow").unwrap();
        let (engine, _) = restored(&store, at(0));
        assert_eq!(engine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn invalid_operations_are_noops() {
        let (mut engine, _, notifier) = engine();
        assert!(engine.stop_work(at(0)).unwrap().is_none());
        assert!(engine.start_rest(at(0), 300).unwrap().is_none());
        assert!(engine.complete_rest(at(0)).unwrap().is_none());
        assert!(engine.complete_work(at(0)).unwrap().is_none());
        assert!(engine.complete_task(at(0)).unwrap().is_none());
        assert!(engine.tick(at(0)).unwrap().is_none());
        assert_eq!(engine.phase(), SessionPhase::Idle);

        engine.start_work(at(0), 60).unwrap();
        assert!(engine.start_work(at(1), 60).unwrap().is_none());
        assert!(engine.start_rest(at(1), 60).unwrap().is_none());
        assert_eq!(engine.state().ends_at(), Some(at(60)));
        assert_eq!(notifier.scheduled_count(), 1);
    }

    #[test]
    fn non_positive_durations_use_configured_defaults() {
        let (mut engine, _, _) = engine();
        engine.start_work(at(0), 0).unwrap();
        assert_eq!(engine.state().total_duration_secs(), 25 * 60);
        engine.stop_work(at(1)).unwrap();
        engine.start_rest(at(2), -10).unwrap();
        assert_eq!(engine.state().total_duration_secs(), 15 * 60);
    }

    #[test]
    fn huge_durations_are_capped() {
        let (mut engine, _, _) = engine();
        engine.start_work(at(0), i64::MAX).unwrap();
        assert_eq!(engine.state().total_duration_secs(), MAX_INTERVAL_SECS);
    }

    #[test]
    fn configured_break_lengths_are_authoritative() {
        let (mut engine, _, notifier) = engine();
        engine
            .set_durations(Durations::from_minutes(25, 5, 30))
            .unwrap();

        engine.start_work(at(0), 1500).unwrap();
        engine.stop_work(at(10)).unwrap();
        engine.start_short_break(at(10)).unwrap();
        assert_eq!(engine.state().total_duration_secs(), 5 * 60);
        engine.complete_rest(at(20)).unwrap();

        engine.start_work(at(30), 1500).unwrap();
        engine.tick(at(1530)).unwrap();
        let event = engine.complete_task(at(1530)).unwrap();
        assert!(matches!(event, Some(Event::RestStarted { duration_secs: 1800, .. })));
        assert_eq!(notifier.pending()[0].title, "Rest finished");
    }

    #[test]
    fn work_alert_quotes_pause_minutes() {
        let (mut engine, _, notifier) = engine();
        engine.set_durations(Durations::from_minutes(25, 5, 30)).unwrap();
        engine.start_work(at(0), 60).unwrap();
        assert_eq!(notifier.pending()[0].body, "Take a 5-minute break.");
    }

    #[test]
    fn ending_rest_early_is_flagged() {
        let (mut engine, _, _) = engine();
        engine.start_work(at(0), 60).unwrap();
        engine.tick(at(60)).unwrap();
        engine.start_rest(at(60), 300).unwrap();
        let event = engine.complete_rest(at(100)).unwrap();
        assert!(matches!(event, Some(Event::RestCompleted { early: true, .. })));
        assert_eq!(engine.phase(), SessionPhase::Idle);
    }

    #[test]
    fn expired_rest_can_roll_into_another_rest() {
        let (mut engine, _, notifier) = engine();
        engine.start_work(at(0), 60).unwrap();
        engine.stop_work(at(30)).unwrap();
        engine.start_rest(at(30), 60).unwrap();
        assert!(engine.start_rest(at(60), 60).unwrap().is_none());

        let event = engine.start_rest(at(90), 120).unwrap();
        assert!(matches!(event, Some(Event::RestStarted { duration_secs: 120, .. })));
        assert_eq!(engine.remaining_secs(at(90)), 120);
        assert_eq!(notifier.pending().len(), 1);
    }

    #[test]
    fn tick_after_long_gap_completes_once() {
        let (mut engine, _, _) = engine();
        engine.start_work(at(0), 60).unwrap();
        assert!(engine.tick(at(10_000)).unwrap().is_some());
        assert!(engine.tick(at(10_001)).unwrap().is_none());
        assert_eq!(engine.phase(), SessionPhase::Paused);
    }

    #[test]
    fn legacy_snapshot_restores_with_start_at_now() {
        let store = Arc::new(MemoryStore::new());
        store.set("session.isRunning", "true").unwrap();
        store.set("session.isRest", "true").unwrap();
        store
            .set("session.endTimestamp", &at(300).timestamp().to_string())
            .unwrap();

        let (engine, _) = restored(&store, at(100));
        assert_eq!(engine.phase(), SessionPhase::Resting);
        assert_eq!(engine.remaining_secs(at(100)), 200);
        assert_eq!(engine.state().total_duration_secs(), 200);
        assert_eq!(engine.progress(at(100)), 0.0);
    }

    #[test]
    fn snapshot_reports_countdown() {
        let (mut engine, _, _) = engine();
        engine.start_work(at(0), 1500).unwrap();
        let snap = engine.snapshot(at(1));
        assert_eq!(snap.phase, SessionPhase::Working);
        assert_eq!(snap.remaining_secs, 1499);
        assert_eq!(snap.total_secs, 1500);
        assert_eq!(snap.ends_at, Some(at(1500)));
    }
}
