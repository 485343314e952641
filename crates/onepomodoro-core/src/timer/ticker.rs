//! Repeating foreground callbacks.
//!
//! The 1-second foreground refresh is modelled as a capability so hosts can
//! back it with a real runtime ([`TokioTicker`]) and tests can drive it by
//! hand ([`ManualTicker`]).

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

/// Called once per interval. `Break` ends the loop.
pub type TickCallback = Box<dyn FnMut() -> ControlFlow<()> + Send + 'static>;

pub trait TickScheduler {
    fn schedule_repeating(&self, interval: Duration, callback: TickCallback) -> TickHandle;
}

/// Owner of one repeating loop. Dropping the handle cancels the loop.
pub struct TickHandle {
    finished: Arc<AtomicBool>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TickHandle {
    pub fn new(finished: Arc<AtomicBool>, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            finished,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// False once the loop was cancelled or ended itself.
    pub fn is_active(&self) -> bool {
        !self.finished.load(Ordering::SeqCst)
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.finished.store(true, Ordering::SeqCst);
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TickHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Runs each loop as a task on a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioTicker {
    handle: Handle,
}

impl TokioTicker {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime this is called from.
    ///
    /// # Panics
    /// Panics outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl TickScheduler for TokioTicker {
    fn schedule_repeating(&self, interval: Duration, mut callback: TickCallback) -> TickHandle {
        let finished = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&finished);
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if callback().is_break() {
                    break;
                }
            }
            done.store(true, Ordering::SeqCst);
        });
        TickHandle::new(finished, move || task.abort())
    }
}

struct ManualLoop {
    callback: TickCallback,
    finished: Arc<AtomicBool>,
}

/// Fires loops only when [`ManualTicker::fire`] is called.
#[derive(Clone, Default)]
pub struct ManualTicker {
    loops: Arc<Mutex<Vec<ManualLoop>>>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one round of every live loop. Returns how many are still live.
    pub fn fire(&self) -> usize {
        let mut loops = self.loops.lock().unwrap_or_else(|e| e.into_inner());
        loops.retain(|l| !l.finished.load(Ordering::SeqCst));
        for l in loops.iter_mut() {
            if (l.callback)().is_break() {
                l.finished.store(true, Ordering::SeqCst);
            }
        }
        loops.retain(|l| !l.finished.load(Ordering::SeqCst));
        loops.len()
    }

    /// Loops scheduled and not yet cancelled or ended.
    pub fn active_loops(&self) -> usize {
        let loops = self.loops.lock().unwrap_or_else(|e| e.into_inner());
        loops
            .iter()
            .filter(|l| !l.finished.load(Ordering::SeqCst))
            .count()
    }
}

impl TickScheduler for ManualTicker {
    fn schedule_repeating(&self, _interval: Duration, callback: TickCallback) -> TickHandle {
        let finished = Arc::new(AtomicBool::new(false));
        self.loops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ManualLoop {
                callback,
                finished: Arc::clone(&finished),
            });
        TickHandle::new(finished, || {})
    }
}
