//! Host-facing session controller.
//!
//! Wraps the engine in a single mutex so the foreground tick loop and user
//! actions never interleave a read-modify-write, owns the one tick loop, and
//! publishes a snapshot after every change.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::engine::SessionEngine;
use super::state::Durations;
use super::ticker::{TickHandle, TickScheduler};
use crate::clock::Clock;
use crate::error::{CoreError, Result};
use crate::events::{Event, SessionSnapshot};
use crate::notify::Notifier;
use crate::storage::KeyValueStore;

/// Foreground refresh period.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub type SharedEngine<S, N> = Arc<Mutex<SessionEngine<S, N>>>;

pub struct SessionController<S, N, C, T> {
    engine: SharedEngine<S, N>,
    clock: Arc<C>,
    ticker: T,
    tick: Option<TickHandle>,
    updates: Arc<watch::Sender<SessionSnapshot>>,
}

impl<S, N, C, T> SessionController<S, N, C, T>
where
    S: KeyValueStore + 'static,
    N: Notifier + 'static,
    C: Clock + 'static,
    T: TickScheduler,
{
    /// Reconstruct the session from the store, then start ticking if an
    /// interval is still running. No tick can run before the store is read.
    pub fn restore(
        store: S,
        notifier: N,
        durations: Durations,
        clock: Arc<C>,
        ticker: T,
    ) -> Result<(Self, Option<Event>)> {
        let now = clock.now();
        let (engine, event) = SessionEngine::restore(store, notifier, durations, now)?;
        let (updates, _) = watch::channel(engine.snapshot(now));

        let mut controller = Self {
            engine: Arc::new(Mutex::new(engine)),
            clock,
            ticker,
            tick: None,
            updates: Arc::new(updates),
        };
        controller.sync_ticker(false)?;
        Ok((controller, event))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn snapshot(&self) -> Result<SessionSnapshot> {
        let now = self.clock.now();
        Ok(self.lock()?.snapshot(now))
    }

    /// Receive a snapshot after every transition and every tick.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Whether a foreground tick loop is live.
    pub fn is_ticking(&self) -> bool {
        self.tick.as_ref().is_some_and(TickHandle::is_active)
    }

    pub fn engine(&self) -> SharedEngine<S, N> {
        Arc::clone(&self.engine)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start_work(&mut self, duration_secs: i64) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.start_work(now, duration_secs))
    }

    pub fn stop_work(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.stop_work(now))
    }

    pub fn start_rest(&mut self, duration_secs: i64) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.start_rest(now, duration_secs))
    }

    pub fn start_short_break(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.start_short_break(now))
    }

    pub fn complete_task(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.complete_task(now))
    }

    pub fn complete_rest(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.complete_rest(now))
    }

    pub fn reset(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.reset(now))
    }

    pub fn set_durations(&mut self, durations: Durations) -> Result<()> {
        self.apply(|engine, _| engine.set_durations(durations).map(|()| None))?;
        Ok(())
    }

    /// The host is going to the background: persist and stop ticking.
    /// The pending alert stays scheduled.
    pub fn suspend(&mut self) -> Result<()> {
        if let Some(handle) = self.tick.take() {
            handle.cancel();
            debug!("tick loop stopped for suspend");
        }
        self.lock()?.persist()
    }

    /// The host is back in the foreground: re-read the store and resume.
    pub fn resume(&mut self) -> Result<Option<Event>> {
        self.apply(|engine, now| engine.reconstruct(now))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn lock(&self) -> Result<MutexGuard<'_, SessionEngine<S, N>>> {
        self.engine.lock().map_err(|_| CoreError::LockPoisoned)
    }

    fn apply<F>(&mut self, op: F) -> Result<Option<Event>>
    where
        F: FnOnce(&mut SessionEngine<S, N>, DateTime<Utc>) -> Result<Option<Event>>,
    {
        let now = self.clock.now();
        let (event, snapshot) = {
            let mut engine = self.lock()?;
            let event = op(&mut engine, now)?;
            (event, engine.snapshot(now))
        };
        self.updates.send_replace(snapshot);

        let restarted = matches!(
            event,
            Some(Event::WorkStarted { .. } | Event::RestStarted { .. })
        );
        self.sync_ticker(restarted)?;
        Ok(event)
    }

    /// Keep exactly one tick loop while running and none otherwise. A newly
    /// started interval always gets a fresh loop.
    fn sync_ticker(&mut self, restart: bool) -> Result<()> {
        let running = self.lock()?.phase().is_running();

        if restart || !running {
            if let Some(handle) = self.tick.take() {
                handle.cancel();
            }
        }
        if running && !self.is_ticking() {
            self.tick = Some(self.spawn_tick_loop());
            debug!("tick loop started");
        }
        Ok(())
    }

    fn spawn_tick_loop(&self) -> TickHandle {
        let engine = Arc::clone(&self.engine);
        let clock = Arc::clone(&self.clock);
        let updates = Arc::clone(&self.updates);

        self.ticker.schedule_repeating(
            TICK_INTERVAL,
            Box::new(move || {
                let now = clock.now();
                let Ok(mut engine) = engine.lock() else {
                    error!("session lock poisoned, stopping tick loop");
                    return ControlFlow::Break(());
                };
                match engine.tick(now) {
                    Ok(Some(event)) => info!(?event, "interval ended"),
                    Ok(None) => {}
                    Err(e) => warn!("tick failed: {e}"),
                }
                let snapshot = engine.snapshot(now);
                let running = snapshot.phase.is_running();
                updates.send_replace(snapshot);
                if running {
                    ControlFlow::Continue(())
                } else {
                    ControlFlow::Break(())
                }
            }),
        )
    }
}
