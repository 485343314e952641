//! Persisted session snapshot.
//!
//! The snapshot is a handful of flat keys rather than one blob so that a
//! partially written or hand-edited store degrades to "no session" instead of
//! failing to decode.
//!
//! | key                            | value                                  |
//! |--------------------------------|----------------------------------------|
//! | `session.endTimestamp`         | epoch seconds, absent when not running |
//! | `session.isRest`               | `true` while resting                   |
//! | `session.isRunning`            | `true` while an interval counts down   |
//! | `session.isPaused`             | `true` between work and break          |
//! | `session.startTimestamp`       | epoch seconds, absent when not running |
//! | `session.totalDurationSeconds` | length of the current/last interval    |

use chrono::{DateTime, Utc};
use tracing::warn;

use super::KeyValueStore;
use crate::error::StorageError;
use crate::timer::{SessionPhase, SessionState};

pub const KEY_END: &str = "session.endTimestamp";
pub const KEY_IS_REST: &str = "session.isRest";
pub const KEY_IS_RUNNING: &str = "session.isRunning";
pub const KEY_IS_PAUSED: &str = "session.isPaused";
pub const KEY_START: &str = "session.startTimestamp";
pub const KEY_TOTAL: &str = "session.totalDurationSeconds";

/// What the store says about the session, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedSession {
    /// Nothing running, nothing paused (also used for malformed data).
    Idle,
    Paused {
        total_secs: Option<u64>,
    },
    Running {
        is_rest: bool,
        ends_at: DateTime<Utc>,
        /// Absent in snapshots that only carry the end timestamp.
        started_at: Option<DateTime<Utc>>,
    },
}

/// Reads and writes the session snapshot keys.
pub struct SessionStore<S> {
    store: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Write every key for `state`. Keys that do not apply are removed.
    pub fn save(&self, state: &SessionState) -> Result<(), StorageError> {
        let phase = state.phase();
        match (state.started_at(), state.ends_at()) {
            (Some(start), Some(end)) => {
                self.store.set(KEY_END, &encode_epoch(end))?;
                self.store.set(KEY_START, &encode_epoch(start))?;
            }
            _ => {
                self.store.remove(KEY_END)?;
                self.store.remove(KEY_START)?;
            }
        }
        self.store.set(
            KEY_TOTAL,
            &state.total_duration_secs().to_string(),
        )?;
        self.store
            .set(KEY_IS_REST, bool_str(phase == SessionPhase::Resting))?;
        self.store
            .set(KEY_IS_PAUSED, bool_str(phase == SessionPhase::Paused))?;
        self.store
            .set(KEY_IS_RUNNING, bool_str(phase.is_running()))?;
        Ok(())
    }

    /// Decode the snapshot. Missing or malformed data reads as
    /// [`PersistedSession::Idle`]; only store failures are errors.
    pub fn load(&self) -> Result<PersistedSession, StorageError> {
        let is_running = match self.read_bool(KEY_IS_RUNNING)? {
            Ok(flag) => flag.unwrap_or(false),
            Err(raw) => {
                warn!("malformed {KEY_IS_RUNNING} value {raw:?}, starting fresh");
                return Ok(PersistedSession::Idle);
            }
        };

        if is_running {
            let ends_at = match self.store.get(KEY_END)?.as_deref().map(decode_epoch) {
                Some(Some(end)) => end,
                other => {
                    warn!("running session without a valid end timestamp ({other:?}), starting fresh");
                    return Ok(PersistedSession::Idle);
                }
            };
            let is_rest = match self.read_bool(KEY_IS_REST)? {
                Ok(flag) => flag.unwrap_or(false),
                Err(raw) => {
                    warn!("malformed {KEY_IS_REST} value {raw:?}, starting fresh");
                    return Ok(PersistedSession::Idle);
                }
            };
            let started_at = self
                .store
                .get(KEY_START)?
                .as_deref()
                .and_then(decode_epoch)
                .filter(|start| *start < ends_at);
            return Ok(PersistedSession::Running {
                is_rest,
                ends_at,
                started_at,
            });
        }

        match self.read_bool(KEY_IS_PAUSED)? {
            Ok(Some(true)) => {
                let total_secs = self
                    .store
                    .get(KEY_TOTAL)?
                    .and_then(|raw| raw.trim().parse::<u64>().ok())
                    .filter(|secs| *secs > 0);
                Ok(PersistedSession::Paused { total_secs })
            }
            Ok(_) => Ok(PersistedSession::Idle),
            Err(raw) => {
                warn!("malformed {KEY_IS_PAUSED} value {raw:?}, starting fresh");
                Ok(PersistedSession::Idle)
            }
        }
    }

    /// `Ok(Ok(None))` for a missing key, `Ok(Err(raw))` for garbage.
    fn read_bool(&self, key: &str) -> Result<Result<Option<bool>, String>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(Ok(None));
        };
        Ok(match raw.trim() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(raw),
        })
    }
}

fn bool_str(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

/// Epoch seconds with millisecond precision; whole seconds print without a
/// fraction.
fn encode_epoch(at: DateTime<Utc>) -> String {
    (at.timestamp_millis() as f64 / 1000.0).to_string()
}

/// Accepts integer or fractional epoch seconds. Rejects non-positive and
/// non-finite values.
fn decode_epoch(raw: &str) -> Option<DateTime<Utc>> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}
