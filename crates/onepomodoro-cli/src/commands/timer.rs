use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use onepomodoro_core::notify::{AlertQueue, QueuedAlert, QueuedNotifier};
use onepomodoro_core::timer::TokioTicker;
use onepomodoro_core::{Config, Database, Event, SessionController, SystemClock};
use tracing::debug;

type Controller =
    SessionController<Database, QueuedNotifier<Database, SystemClock>, SystemClock, TokioTicker>;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a work interval
    Start {
        /// Length in minutes (configured focus length when omitted)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Stop the running work interval early
    Stop,
    /// Take the configured short break after stopping work
    Break,
    /// Mark the task done and take the configured long rest
    Done,
    /// Start a rest of a given length
    Rest {
        #[arg(long)]
        minutes: u32,
    },
    /// End the current rest
    Finish,
    /// Back to idle from any phase
    Reset,
    /// Print current session state as JSON
    Status,
    /// Follow the countdown until the interval ends (Ctrl-C to detach)
    Watch,
}

fn minutes_to_secs(minutes: Option<u32>) -> i64 {
    minutes.map_or(0, |m| i64::from(m) * 60)
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn deliver(alert: &QueuedAlert) {
    eprintln!("\x07{}: {}", alert.title, alert.body);
}

/// Deliver the pending alert if it is due. Runs before the session is
/// reconstructed, since completing an expired interval clears the slot.
fn deliver_due(queue: &AlertQueue<Database>) -> CliResult {
    if let Some(alert) = queue.take_due(Utc::now())? {
        deliver(&alert);
    }
    Ok(())
}

pub async fn run(action: TimerAction) -> CliResult {
    let config = Config::load_or_default();
    let queue = AlertQueue::new(Database::open()?);
    deliver_due(&queue)?;

    let notifier = QueuedNotifier::new(
        Database::open()?,
        SystemClock,
        config.notifications.enabled,
    );
    let (mut controller, restored) = Controller::restore(
        Database::open()?,
        notifier,
        config.durations(),
        Arc::new(SystemClock),
        TokioTicker::current(),
    )?;

    match restored {
        Some(Event::SessionRestored { .. }) | None => debug!(?restored, "session loaded"),
        Some(event) => print_json(&event)?,
    }

    let event = match action {
        TimerAction::Start { minutes } => controller.start_work(minutes_to_secs(minutes))?,
        TimerAction::Stop => controller.stop_work()?,
        TimerAction::Break => controller.start_short_break()?,
        TimerAction::Done => controller.complete_task()?,
        TimerAction::Rest { minutes } => controller.start_rest(minutes_to_secs(Some(minutes)))?,
        TimerAction::Finish => controller.complete_rest()?,
        TimerAction::Reset => controller.reset()?,
        TimerAction::Status => None,
        TimerAction::Watch => {
            watch(&controller, &queue).await?;
            None
        }
    };

    if let Some(event) = event {
        print_json(&event)?;
    }
    print_json(&Event::StateSnapshot(controller.snapshot()?))?;

    controller.suspend()?;
    Ok(())
}

/// Print one compact snapshot per line while the interval runs.
async fn watch(controller: &Controller, queue: &AlertQueue<Database>) -> CliResult {
    let mut updates = controller.subscribe();
    let mut armed = queue.peek()?;

    loop {
        let snapshot = updates.borrow_and_update().clone();
        if !snapshot.phase.is_running() {
            // Only the tick loop moves the session here, so the interval ran out.
            if let Some(alert) = armed.take() {
                deliver(&alert);
            }
            return Ok(());
        }
        println!("{}", serde_json::to_string(&snapshot)?);
        armed = queue.peek()?.or(armed);

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("detached from watch");
                return Ok(());
            }
        }
    }
}
