use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::{JobStore, StoreError};

/// Fails jobs stuck in `processing` after their dispatcher died mid-flight.
///
/// Stale jobs are failed rather than requeued: a retry could collide with a
/// remote function the dead run already created.
pub struct StaleJobReaper {
    store: Arc<dyn JobStore>,
    older_than: Duration,
}

impl StaleJobReaper {
    pub fn new(store: Arc<dyn JobStore>, older_than: Duration) -> Self {
        Self { store, older_than }
    }

    /// One sweep; returns the ids that were failed.
    pub async fn sweep(&self) -> Result<Vec<Uuid>, StoreError> {
        let reaped = self.store.fail_stale_processing(self.older_than).await?;
        for id in &reaped {
            warn!(job_id = %id, "Failed stale processing job");
        }
        Ok(reaped)
    }

    /// Sweep every `interval` until the shutdown flag flips.
    pub async fn run(&self, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs(),
            stale_after_secs = self.older_than.as_secs(),
            "Stale job reaper started"
        );

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                _ = sleep(interval) => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Stale job sweep failed");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        // sender dropped
                        break;
                    }
                }
            }
        }

        info!("Stale job reaper stopped");
    }
}
