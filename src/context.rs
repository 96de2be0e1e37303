//! Cancellation context passed to every lifecycle invocation.
//!
//! A [`Context`] is checked before each remote call, raced against every
//! in-flight call, and raced against every polling or retry sleep. Clones
//! share the same cancellation signal.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{OperationError, Result};

/// Cancellation signal plus an optional deadline.
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self {
            cancelled: rx,
            deadline: None,
        }
    }

    /// A context together with the handle that cancels it.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancelled: rx,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Returns a copy of this context that also expires after `timeout`.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(deadline),
        }
    }

    /// Returns true once cancellation was signalled or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let flagged = *self.cancelled.borrow();
        flagged || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fails with [`OperationError::Cancelled`] if the context is done.
    ///
    /// # Errors
    ///
    /// Returns an error if the context was cancelled or expired.
    pub fn check(&self, activity: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(cancelled(activity));
        }
        Ok(())
    }

    /// Completes when the context is cancelled or expires.
    pub async fn done(&self) {
        let mut rx = self.cancelled.clone();
        let signal = async move {
            loop {
                let flagged = *rx.borrow_and_update();
                if flagged {
                    return;
                }
                if rx.changed().await.is_err() {
                    // Sender dropped without cancelling.
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = signal => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => signal.await,
        }
    }

    /// Runs `fut` unless the context is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns the future's error, or a cancellation error.
    pub async fn run<T, F>(&self, activity: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(activity)?;
        tokio::select! {
            result = fut => result,
            () = self.done() => Err(cancelled(activity)),
        }
    }

    /// Sleeps for `duration` unless the context is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns a cancellation error if the context finishes first.
    pub async fn sleep(&self, activity: &str, duration: Duration) -> Result<()> {
        self.check(activity)?;
        tokio::select! {
            () = tokio::time::sleep(duration) => Ok(()),
            () = self.done() => Err(cancelled(activity)),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

fn cancelled(activity: &str) -> crate::error::SkyforgeError {
    OperationError::Cancelled {
        activity: activity.to_string(),
    }
    .into()
}
