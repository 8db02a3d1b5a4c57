//! Cooperative cancellation for engine calls
//!
//! A [`CancelHandle`] owns a `watch` channel; every [`CancelSignal`] cloned from
//! it observes the same flag. Engine calls check the signal before outbound I/O
//! and race it against the special-selection sub-task.

use crate::error::{BattleError, Result};
use tokio::sync::watch;

/// Owner side of a cancellation flag
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal observed by engine calls
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: Some(self.tx.subscribe()),
        }
    }

    /// Cancel every call holding a signal from this handle
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of a cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Fail with [`BattleError::Cancelled`] if the signal has fired
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BattleError::Cancelled.into());
        }
        Ok(())
    }

    /// Resolve once the signal fires. Pending forever for [`CancelSignal::never`]
    /// or when the handle is dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
