mod controller;
mod engine;
mod state;
mod ticker;

pub use controller::{SessionController, SharedEngine, TICK_INTERVAL};
pub use engine::{SessionEngine, MAX_INTERVAL_SECS};
pub use state::{
    Durations, SessionPhase, SessionState, DEFAULT_PAUSE_SECS, DEFAULT_REST_SECS,
    DEFAULT_WORK_SECS,
};
pub use ticker::{ManualTicker, TickCallback, TickHandle, TickScheduler, TokioTicker};
