//! Background reclamation worker for bounded pools
//!
//! The worker owns a cancellation token and a tokio task that invokes a
//! shrink callback once per interval. It is decoupled from the pool through
//! the callback so the pool can hand it a weak reference to its state.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::errors::{PoolError, PoolResult};

pub(crate) struct ShrinkWorker {
    cancel: CancellationToken,
}

impl ShrinkWorker {
    /// Spawn the periodic shrink task on the current tokio runtime.
    ///
    /// `shrink` returns the number of evicted objects, or `None` once the
    /// pool it serves is gone, which ends the task. It runs on the blocking
    /// thread pool since it takes the pool lock and runs cleanup functions.
    pub fn start<F>(interval: Duration, shrink: F) -> PoolResult<Self>
    where
        F: Fn() -> Option<usize> + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| {
            PoolError::configuration("shrink_interval requires a running tokio runtime")
        })?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let shrink = Arc::new(shrink);

        drop(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = token.cancelled() => break,
                }

                let cycle = Arc::clone(&shrink);
                match tokio::task::spawn_blocking(move || cycle()).await {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(error) => {
                        tracing::warn!(%error, "shrink cycle aborted, stopping shrink worker");
                        break;
                    }
                }
            }

            tracing::trace!("shrink worker exited");
        }));

        Ok(Self { cancel })
    }

    /// Stop future shrink cycles. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ShrinkWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
