use std::sync::{Arc, Mutex, MutexGuard};

use super::{Alert, Notifier};
use crate::error::NotifyError;

#[derive(Debug, Default)]
struct Inner {
    grant: bool,
    permission_requests: usize,
    scheduled: usize,
    pending: Vec<Alert>,
}

/// In-memory notifier that records what it was asked to do.
///
/// Clones share state, so a test can keep one handle and give the other to
/// the engine.
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Inner>>,
}

impl RecordingNotifier {
    /// A notifier whose permission prompt is accepted.
    pub fn new() -> Self {
        Self::with_grant(true)
    }

    /// A notifier whose permission prompt is refused.
    pub fn denying() -> Self {
        Self::with_grant(false)
    }

    fn with_grant(grant: bool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                grant,
                ..Inner::default()
            })),
        }
    }

    pub fn pending(&self) -> Vec<Alert> {
        self.lock().pending.clone()
    }

    /// Total `schedule` calls that were accepted.
    pub fn scheduled_count(&self) -> usize {
        self.lock().scheduled
    }

    pub fn permission_requests(&self) -> usize {
        self.lock().permission_requests
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for RecordingNotifier {
    fn request_permission(&mut self) -> bool {
        let mut inner = self.lock();
        inner.permission_requests += 1;
        inner.grant
    }

    fn schedule(&mut self, alert: &Alert) -> Result<(), NotifyError> {
        let mut inner = self.lock();
        inner.pending.retain(|a| a.id != alert.id);
        inner.pending.push(alert.clone());
        inner.scheduled += 1;
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), NotifyError> {
        self.lock().pending.clear();
        Ok(())
    }
}
