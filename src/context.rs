//! Execution context shared by every component of a run
//!
//! Built once in `main`, handed down by reference, and dropped on exit.
//! It owns the interrupt token: Ctrl+C cancels it, and every suspension
//! point (prompts, pacing delays, the recurrence sleep) checks it.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

pub struct RunContext {
    cancel: CancellationToken,
    signal_task: Option<JoinHandle<()>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            signal_task: None,
        }
    }

    /// Cancel the context on the first Ctrl+C.
    pub fn install_signal_handler(&mut self) {
        let cancel = self.cancel.clone();
        self.signal_task = Some(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("SIGINT received");
                cancel.cancel();
            }
        }));
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Sleep unless interrupted first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        self.interruptible(tokio::time::sleep(duration)).await
    }

    /// Run `fut` to completion, or fail with [`Error::Interrupted`] if the
    /// context is cancelled first.
    pub async fn interruptible<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Interrupted),
            out = fut => Ok(out),
        }
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        if let Some(task) = self.signal_task.take() {
            task.abort();
        }
    }
}
