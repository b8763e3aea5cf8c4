//! Background worker threads with cooperative cancellation.
//!
//! Each sync engine runs as one named `std::thread`. Stopping sets a shared
//! flag that the loop checks between cycles, between the requests of a
//! cycle and once per second while sleeping, then joins the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::warn;

/// Granularity of interruptible sleeps.
pub const SLEEP_TICK: Duration = Duration::from_secs(1);

/// Shared stop flag handed to a worker loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `secs` in one-second ticks. Returns `false` if cancelled
    /// before the full duration elapsed.
    pub fn sleep_secs(&self, secs: u64) -> bool {
        for _ in 0..secs {
            if self.is_cancelled() {
                return false;
            }
            thread::sleep(SLEEP_TICK);
        }
        !self.is_cancelled()
    }
}

/// A running worker thread and the token that stops it.
#[derive(Debug)]
pub struct BackgroundWorker {
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundWorker {
    /// Spawn `body` on a named thread. The closure receives the cancel token.
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let token = CancelToken::new();
        let thread_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(thread_token))?;
        Ok(Self {
            token,
            handle: Some(handle),
        })
    }

    /// True until the thread body returns.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!(worker = %name, "worker thread panicked");
            }
        }
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
