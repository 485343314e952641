use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{Alert, Notifier, SESSION_END_ALERT_ID};
use crate::timer::SessionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    WorkEnded,
    RestEnded,
}

impl AlertKind {
    /// The alert announcing the end of `phase`, if it is a running phase.
    pub fn for_phase(phase: SessionPhase) -> Option<Self> {
        match phase {
            SessionPhase::Working => Some(AlertKind::WorkEnded),
            SessionPhase::Resting => Some(AlertKind::RestEnded),
            SessionPhase::Idle | SessionPhase::Paused => None,
        }
    }

    fn content(self, pause_minutes: u64) -> (String, String) {
        match self {
            AlertKind::WorkEnded => (
                "Work session finished".to_string(),
                format!("Take a {pause_minutes}-minute break."),
            ),
            AlertKind::RestEnded => (
                "Rest finished".to_string(),
                "Time to get back to work.".to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Permission {
    Unknown,
    Granted,
    Denied,
}

/// Keeps exactly one pending "phase ended" alert while an interval runs, and
/// none otherwise.
///
/// Backend failures and missing permission are logged and swallowed: they
/// only mean the alert is not delivered.
pub struct NotificationCoordinator<N> {
    notifier: N,
    permission: Permission,
    pending: Option<AlertKind>,
    pause_minutes: u64,
}

impl<N: Notifier> NotificationCoordinator<N> {
    pub fn new(notifier: N, pause_minutes: u64) -> Self {
        Self {
            notifier,
            permission: Permission::Unknown,
            pending: None,
            pause_minutes,
        }
    }

    /// Minutes quoted in the work-ended alert body.
    pub fn set_pause_minutes(&mut self, minutes: u64) {
        self.pause_minutes = minutes;
    }

    /// The alert this coordinator believes is pending.
    pub fn pending(&self) -> Option<AlertKind> {
        self.pending
    }

    /// Replace any pending alert with one firing `secs_from_now` seconds out.
    pub fn schedule_end(&mut self, kind: AlertKind, secs_from_now: u64) {
        self.cancel_all();

        if !self.ensure_permission() {
            debug!(?kind, "alerts not permitted, skipping schedule");
            return;
        }

        let (title, body) = kind.content(self.pause_minutes);
        let alert = Alert {
            id: SESSION_END_ALERT_ID.to_string(),
            fire_after_secs: secs_from_now.max(1),
            title,
            body,
        };
        match self.notifier.schedule(&alert) {
            Ok(()) => {
                debug!(?kind, fire_after_secs = alert.fire_after_secs, "alert scheduled");
                self.pending = Some(kind);
            }
            Err(e) => warn!("failed to schedule {kind:?} alert: {e}"),
        }
    }

    /// Remove any pending alert. Safe when none exists.
    pub fn cancel_all(&mut self) {
        if let Err(e) = self.notifier.cancel_all() {
            warn!("failed to cancel pending alerts: {e}");
        }
        self.pending = None;
    }

    fn ensure_permission(&mut self) -> bool {
        if self.permission == Permission::Unknown {
            self.permission = if self.notifier.request_permission() {
                info!("alert permission granted");
                Permission::Granted
            } else {
                warn!("alert permission not granted; session-end alerts will not be delivered");
                Permission::Denied
            };
        }
        self.permission == Permission::Granted
    }
}
