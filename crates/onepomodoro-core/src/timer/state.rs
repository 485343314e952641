use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WORK_SECS: u64 = 25 * 60;
pub const DEFAULT_PAUSE_SECS: u64 = 15 * 60;
pub const DEFAULT_REST_SECS: u64 = 45 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    /// Nothing started yet, or the last rest finished.
    Idle,
    Working,
    /// A work interval ended (or was stopped); waiting for a break to start.
    Paused,
    Resting,
}

impl SessionPhase {
    /// True while an interval is counting down.
    pub fn is_running(self) -> bool {
        matches!(self, SessionPhase::Working | SessionPhase::Resting)
    }
}

/// Configured interval lengths in seconds. All values are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Durations {
    pub work_secs: u64,
    /// Short break taken after an unfinished work interval.
    pub pause_secs: u64,
    /// Long break taken once the task is done.
    pub rest_secs: u64,
}

impl Durations {
    /// Build from minutes; zero falls back to the built-in default.
    pub fn from_minutes(work: u32, pause: u32, rest: u32) -> Self {
        let secs = |minutes: u32, default: u64| {
            if minutes == 0 {
                default
            } else {
                u64::from(minutes) * 60
            }
        };
        Self {
            work_secs: secs(work, DEFAULT_WORK_SECS),
            pause_secs: secs(pause, DEFAULT_PAUSE_SECS),
            rest_secs: secs(rest, DEFAULT_REST_SECS),
        }
    }

    /// Pause length in whole minutes, rounded up. Used for alert wording.
    pub fn pause_minutes(&self) -> u64 {
        self.pause_secs.div_ceil(60)
    }
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            work_secs: DEFAULT_WORK_SECS,
            pause_secs: DEFAULT_PAUSE_SECS,
            rest_secs: DEFAULT_REST_SECS,
        }
    }
}

/// Accept a caller-supplied duration, substituting `fallback` for anything
/// non-positive.
pub(crate) fn positive_or(secs: i64, fallback: u64) -> u64 {
    u64::try_from(secs).ok().filter(|s| *s > 0).unwrap_or(fallback)
}

/// The single mutable session entity.
///
/// `started_at`/`ends_at` are both present exactly when the phase is running,
/// and `ends_at > started_at`. Remaining time is always derived from
/// `ends_at`, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    phase: SessionPhase,
    total_duration_secs: u64,
    started_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// A stopped state (`Idle` or `Paused`) remembering `total_secs`.
    pub(crate) fn stopped(phase: SessionPhase, total_secs: u64) -> Self {
        debug_assert!(!phase.is_running());
        Self {
            phase,
            total_duration_secs: total_secs.max(1),
            started_at: None,
            ends_at: None,
        }
    }

    /// A running state over `[started_at, ends_at)`.
    ///
    /// `ends_at` is bumped to at least one second after `started_at`.
    pub(crate) fn running(
        phase: SessionPhase,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> Self {
        debug_assert!(phase.is_running());
        let ends_at = ends_at.max(started_at + Duration::seconds(1));
        let total = (ends_at - started_at).num_seconds().max(1) as u64;
        Self {
            phase,
            total_duration_secs: total,
            started_at: Some(started_at),
            ends_at: Some(ends_at),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.total_duration_secs
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.ends_at
    }

    /// Whole seconds left at `now`, clamped at zero. Zero when not running.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        match self.ends_at {
            Some(end) => (end - now).num_seconds().max(0) as u64,
            None => 0,
        }
    }

    /// 0.0 .. 1.0 progress through the running interval; 0 when not running.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if !self.phase.is_running() || self.total_duration_secs == 0 {
            return 0.0;
        }
        let remaining = self.remaining_secs(now) as f64;
        (1.0 - remaining / self.total_duration_secs as f64).clamp(0.0, 1.0)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::stopped(SessionPhase::Idle, DEFAULT_WORK_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn running_phases() {
        assert!(SessionPhase::Working.is_running());
        assert!(SessionPhase::Resting.is_running());
        assert!(!SessionPhase::Idle.is_running());
        assert!(!SessionPhase::Paused.is_running());
    }

    #[test]
    fn remaining_is_clamped() {
        let state = SessionState::running(SessionPhase::Working, at(0), at(1500));
        assert_eq!(state.remaining_secs(at(900)), 600);
        assert_eq!(state.remaining_secs(at(1500)), 0);
        assert_eq!(state.remaining_secs(at(9000)), 0);
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let state = SessionState::running(SessionPhase::Resting, at(0), at(300));
        assert_eq!(state.progress(at(0)), 0.0);
        assert!((state.progress(at(150)) - 0.5).abs() < f64::EPSILON);
        assert_eq!(state.progress(at(600)), 1.0);
        assert_eq!(SessionState::default().progress(at(0)), 0.0);
    }

    #[test]
    fn running_never_has_empty_interval() {
        let state = SessionState::running(SessionPhase::Working, at(10), at(10));
        assert_eq!(state.total_duration_secs(), 1);
        assert!(state.ends_at().unwrap() > state.started_at().unwrap());
    }

    #[test]
    fn durations_from_minutes() {
        let d = Durations::from_minutes(50, 0, 30);
        assert_eq!(d.work_secs, 3000);
        assert_eq!(d.pause_secs, DEFAULT_PAUSE_SECS);
        assert_eq!(d.rest_secs, 1800);
        assert_eq!(d.pause_minutes(), 15);
    }

    #[test]
    fn non_positive_durations_fall_back() {
        assert_eq!(positive_or(0, 42), 42);
        assert_eq!(positive_or(-5, 42), 42);
        assert_eq!(positive_or(90, 42), 90);
    }
}
