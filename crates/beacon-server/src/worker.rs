//! Permission-change worker.
//!
//! Consumes [`PermissionChange`] messages from a bounded queue and applies
//! them to the hub one at a time, in arrival order. The worker exits once
//! every sender is dropped and the queue is drained.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::hub::{Hub, PermissionChange, UserRefresh};

/// Background task applying permission changes.
#[derive(Debug)]
pub struct PermissionChangeWorker;

impl PermissionChangeWorker {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// Returns the queue sender and the worker's handle. The handle resolves
    /// to the number of changes processed.
    pub fn spawn(hub: Arc<Hub>) -> (mpsc::Sender<PermissionChange>, JoinHandle<usize>) {
        let (sender, receiver) = mpsc::channel(hub.config().change_queue_capacity.max(1));
        let handle = tokio::spawn(Self::run(hub, receiver));
        (sender, handle)
    }

    async fn run(hub: Arc<Hub>, mut receiver: mpsc::Receiver<PermissionChange>) -> usize {
        let mut processed = 0usize;

        while let Some(change) = receiver.recv().await {
            let refreshes = hub.on_permissions_changed(change).await;
            log_failures(&refreshes);
            processed += 1;
        }

        tracing::debug!(processed, "permission change queue closed");
        processed
    }
}

fn log_failures(refreshes: &[UserRefresh]) {
    for refresh in refreshes {
        match &refresh.outcome {
            Ok(outcome) => {
                if let Some(report) = outcome.report().filter(|report| !report.is_clean()) {
                    tracing::warn!(
                        user = %refresh.user,
                        failed = report.failures.len(),
                        "refresh completed with gateway failures"
                    );
                }
            },
            Err(err) => tracing::warn!(user = %refresh.user, error = %err, "refresh failed"),
        }
    }
}
