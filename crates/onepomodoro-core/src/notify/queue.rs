//! Store-backed alert slot for hosts without a platform notification center.
//!
//! A short-lived host process (the CLI) cannot hold a timer across runs, so
//! the pending alert is written to the key-value store with an absolute fire
//! time and delivered by whichever run first finds it due.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Alert, Notifier};
use crate::clock::Clock;
use crate::error::{NotifyError, StorageError};
use crate::storage::KeyValueStore;

pub const PENDING_ALERT_KEY: &str = "notification.pending";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAlert {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

/// Single-slot pending alert in a key-value store.
pub struct AlertQueue<S> {
    store: S,
}

impl<S: KeyValueStore> AlertQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn put(&self, alert: &QueuedAlert) -> Result<(), StorageError> {
        let json = serde_json::to_string(alert)
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        self.store.set(PENDING_ALERT_KEY, &json)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(PENDING_ALERT_KEY)
    }

    /// The pending alert, if any. A corrupt slot reads as empty.
    pub fn peek(&self) -> Result<Option<QueuedAlert>, StorageError> {
        let Some(raw) = self.store.get(PENDING_ALERT_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(alert) => Ok(Some(alert)),
            Err(e) => {
                warn!("ignoring malformed pending alert: {e}");
                Ok(None)
            }
        }
    }

    /// Remove and return the pending alert if it is due at `now`.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Option<QueuedAlert>, StorageError> {
        match self.peek()? {
            Some(alert) if alert.fire_at <= now => {
                self.clear()?;
                Ok(Some(alert))
            }
            _ => Ok(None),
        }
    }
}

/// [`Notifier`] writing into an [`AlertQueue`].
pub struct QueuedNotifier<S, C> {
    queue: AlertQueue<S>,
    clock: C,
    enabled: bool,
}

impl<S: KeyValueStore, C: Clock> QueuedNotifier<S, C> {
    /// `enabled` is the user's notification preference; it answers the
    /// permission prompt.
    pub fn new(store: S, clock: C, enabled: bool) -> Self {
        Self {
            queue: AlertQueue::new(store),
            clock,
            enabled,
        }
    }

    pub fn queue(&self) -> &AlertQueue<S> {
        &self.queue
    }
}

impl<S: KeyValueStore, C: Clock> Notifier for QueuedNotifier<S, C> {
    fn request_permission(&mut self) -> bool {
        self.enabled
    }

    fn schedule(&mut self, alert: &Alert) -> Result<(), NotifyError> {
        let secs = alert.fire_after_secs.min(u64::from(u32::MAX)) as i64;
        let queued = QueuedAlert {
            id: alert.id.clone(),
            title: alert.title.clone(),
            body: alert.body.clone(),
            fire_at: self.clock.now() + Duration::seconds(secs),
        };
        self.queue
            .put(&queued)
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }

    fn cancel_all(&mut self) -> Result<(), NotifyError> {
        self.queue
            .clear()
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }
}
