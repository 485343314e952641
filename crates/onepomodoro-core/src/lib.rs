//! # One Pomodoro Core Library
//!
//! This library provides the session logic for the One Pomodoro timer: a
//! work/rest state machine that survives process suspension, plus the
//! "phase ended" alert that fires even when the app is not in the foreground.
//! Hosts (the CLI, a mobile shell) render state and forward user gestures.
//!
//! ## Architecture
//!
//! - **Session Engine**: A wall-clock-based state machine. Remaining time is
//!   derived from a persisted absolute end timestamp, never decremented.
//! - **Notification Coordinator**: Keeps one pending alert while an interval
//!   runs and none otherwise.
//! - **Controller**: Owns the engine behind a mutex, the 1-second foreground
//!   tick loop, and the snapshot channel.
//! - **Storage**: SQLite key-value store for the session snapshot and
//!   TOML-based configuration.
//!
//! ## Key Components
//!
//! - [`SessionEngine`]: Core session state machine
//! - [`SessionController`]: Host-facing wrapper with the tick loop
//! - [`NotificationCoordinator`]: Alert scheduling policy
//! - [`Database`]: Durable key-value store
//! - [`Config`]: User-adjustable interval lengths

pub mod clock;
pub mod error;
pub mod events;
pub mod notify;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, NotifyError, StorageError};
pub use events::{Event, SessionSnapshot};
pub use notify::{Alert, AlertKind, NotificationCoordinator, Notifier};
pub use storage::{Config, Database, KeyValueStore, MemoryStore};
pub use timer::{Durations, SessionController, SessionEngine, SessionPhase, SessionState};
