use std::sync::mpsc::{self, Receiver, TrySendError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};

pub const CLOCK_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

// ---------------------------------------------------------------------------
// Display slot (render side)
// ---------------------------------------------------------------------------

/// Receiving end of the live clock. Holds the latest published timestamp.
#[derive(Debug)]
pub struct ClockSlot {
    rx: Receiver<DateTime<Local>>,
    latest: Option<DateTime<Local>>,
}

impl ClockSlot {
    /// Take whatever the updater published since the last call.
    pub fn poll(&mut self) -> Option<DateTime<Local>> {
        if let Some(now) = self.rx.try_iter().last() {
            self.latest = Some(now);
        }
        self.latest
    }

    pub fn display(&mut self) -> Option<String> {
        self.poll().map(|t| t.format(CLOCK_FORMAT).to_string())
    }
}

// ---------------------------------------------------------------------------
// Updater thread
// ---------------------------------------------------------------------------

/// Spawn the clock thread. It publishes the current time every `period`
/// and calls `wake` after each publish so the UI repaints.
///
/// The thread is never joined; it ends with the process. A full or
/// disconnected slot skips that tick.
pub fn spawn_clock<W>(period: Duration, wake: W) -> std::io::Result<(ClockSlot, thread::JoinHandle<()>)>
where
    W: Fn() + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = thread::Builder::new()
        .name("live-clock".into())
        .spawn(move || loop {
            match tx.try_send(Local::now()) {
                Ok(()) => wake(),
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Disconnected(_)) => {
                    log::trace!("clock display slot is gone; skipping tick");
                }
            }
            thread::sleep(period);
        })?;
    Ok((ClockSlot { rx, latest: None }, handle))
}
