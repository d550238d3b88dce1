use crate::highlight::error::HighlightError;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Fires a callback on a named background thread at a fixed interval until
/// cancelled. Dropping the scheduler cancels it.
pub struct RefreshScheduler {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn start<F>(interval: Duration, mut tick: F) -> Result<Self, HighlightError>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::<()>();
        let handle = std::thread::Builder::new()
            .name("highlight-refresh".into())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|err| HighlightError::Scheduler(err.to_string()))?;
        tracing::debug!(?interval, "refresh scheduler started");
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the timer and waits for an in-flight tick to finish.
    pub fn cancel(&mut self) {
        let Some(stop_tx) = self.stop_tx.take() else {
            return;
        };
        let _ = stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == std::thread::current().id() {
                // Cancelled from inside its own tick; the loop exits on return.
                return;
            }
            if handle.join().is_err() {
                tracing::warn!("refresh scheduler thread panicked");
            }
        }
        tracing::debug!("refresh scheduler stopped");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
