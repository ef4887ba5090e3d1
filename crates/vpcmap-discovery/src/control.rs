//! Run-scoped deadline and cancellation.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Deadline plus cancel signal shared by every API call of one run.
#[derive(Debug, Clone)]
pub struct RunControl {
    deadline: Option<Instant>,
    cancel: watch::Receiver<bool>,
}

/// Handle used to cancel a run from outside (e.g. on Ctrl-C).
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RunControl {
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                deadline: None,
                cancel: rx,
            },
            CancelHandle { tx },
        )
    }

    /// A control that never fires.
    pub fn unbounded() -> Self {
        Self::new().0
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` to completion unless the run is cancelled or its deadline passes first.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        if self.is_cancelled() {
            return None;
        }

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                if cancel.changed().await.is_err() {
                    // Sender gone: nobody can cancel any more.
                    std::future::pending::<()>().await;
                }
            }
        };
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            out = fut => Some(out),
            () = cancelled => None,
            () = expired => None,
        }
    }
}
