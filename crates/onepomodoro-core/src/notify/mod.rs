//! Local "phase ended" alerts.
//!
//! The foreground tick loop only runs while the host is visible. Alerts are
//! the background-safe fallback: one is scheduled at the end of every running
//! interval so the user hears about it even if the app is suspended.

mod coordinator;
pub mod queue;
mod recording;

pub use coordinator::{AlertKind, NotificationCoordinator};
pub use queue::{AlertQueue, QueuedAlert, QueuedNotifier};
pub use recording::RecordingNotifier;

use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

/// Identifier shared by every session-end alert, so a new one replaces the old.
pub const SESSION_END_ALERT_ID: &str = "onepomodoro.session.end";

/// A single local notification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub fire_after_secs: u64,
    pub title: String,
    pub body: String,
}

/// Platform local-notification scheduler.
///
/// Implementations must tolerate `cancel_all` with nothing pending.
pub trait Notifier: Send {
    /// Ask the user for permission to deliver alerts. Best-effort.
    fn request_permission(&mut self) -> bool;

    fn schedule(&mut self, alert: &Alert) -> Result<(), NotifyError>;

    fn cancel_all(&mut self) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn request_permission(&mut self) -> bool {
        (**self).request_permission()
    }

    fn schedule(&mut self, alert: &Alert) -> Result<(), NotifyError> {
        (**self).schedule(alert)
    }

    fn cancel_all(&mut self) -> Result<(), NotifyError> {
        (**self).cancel_all()
    }
}
