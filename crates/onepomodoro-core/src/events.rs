use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::SessionPhase;

/// Every session transition produces an Event.
/// Hosts print them, the presentation layer re-renders on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    WorkStarted {
        duration_secs: u64,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// User stopped a work interval before it ran out.
    WorkStopped {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Work interval ran out.
    WorkCompleted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    RestStarted {
        duration_secs: u64,
        ends_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    /// Rest ran out, or the user ended it (`early`).
    RestCompleted {
        early: bool,
        at: DateTime<Utc>,
    },
    SessionReset {
        from: SessionPhase,
        at: DateTime<Utc>,
    },
    /// A running or paused session was picked up from durable storage.
    SessionRestored {
        phase: SessionPhase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot(SessionSnapshot),
}

/// Read-only view of the session at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub remaining_secs: u64,
    pub total_secs: u64,
    /// 0.0 .. 1.0 within the running interval.
    pub progress: f64,
    pub ends_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// `MM:SS` countdown label.
    pub fn countdown(&self) -> String {
        format!("{:02}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let at = DateTime::from_timestamp(0, 0).unwrap();
        let json = serde_json::to_value(Event::RestCompleted { early: true, at }).unwrap();
        assert_eq!(json["type"], "RestCompleted");
        assert_eq!(json["early"], true);
    }

    #[test]
    fn snapshot_event_flattens_fields() {
        let at = DateTime::from_timestamp(0, 0).unwrap();
        let snap = SessionSnapshot {
            phase: SessionPhase::Working,
            remaining_secs: 600,
            total_secs: 1500,
            progress: 0.6,
            ends_at: None,
            at,
        };
        let json = serde_json::to_value(Event::StateSnapshot(snap)).unwrap();
        assert_eq!(json["type"], "StateSnapshot");
        assert_eq!(json["phase"], "working");
        assert_eq!(json["remaining_secs"], 600);
    }

    #[test]
    fn countdown_formats_minutes_and_seconds() {
        let snap = SessionSnapshot {
            phase: SessionPhase::Working,
            remaining_secs: 1499,
            total_secs: 1500,
            progress: 0.0,
            ends_at: None,
            at: DateTime::from_timestamp(0, 0).unwrap(),
        };
        assert_eq!(snap.countdown(), "24:59");
    }
}
