// src/engine/context.rs

//! Cancellation and deadline context threaded through every execution call.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::errors::EngineError;

/// Caller-controlled execution context.
///
/// Cloning is cheap; every clone observes the same cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Trigger side of [`ExecContext::with_cancel`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl ExecContext {
    /// No cancellation, no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        self.cancel = Some(rx);
        (self, CancelHandle { tx })
    }

    /// Deadline `timeout` from now; an earlier existing deadline is kept.
    /// A timeout too large to represent as an instant sets no deadline.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(at) => self.with_deadline(at),
            None => self,
        }
    }

    pub fn with_deadline(mut self, at: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(at),
            None => at,
        });
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail fast if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if self.deadline.is_some_and(|at| Instant::now() >= at) {
            return Err(EngineError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the context is cancelled or its deadline passes; never
    /// resolves for a background context.
    pub async fn interrupted(&self) -> EngineError {
        let cancelled = async {
            if let Some(rx) = &self.cancel {
                let mut rx = rx.clone();
                let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
                if fired {
                    return;
                }
            }
            std::future::pending::<()>().await
        };

        let expired = async {
            match self.deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => EngineError::Cancelled,
            _ = expired => EngineError::DeadlineExceeded,
        }
    }
}
