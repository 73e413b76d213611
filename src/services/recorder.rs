use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::locations::{LocationService, RecordTask};

/// Upper bound on recording a single check.
const RECORD_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands recorded checks from request handlers to one background task.
///
/// Submitting never waits: when the buffer is full the check is dropped and
/// counted as a failure. On shutdown the task stops accepting work and drains
/// what is already buffered.
#[derive(Clone)]
pub struct CheckRecorder {
    tx: mpsc::Sender<RecordTask>,
}

impl CheckRecorder {
    pub fn spawn(
        service: Arc<LocationService>,
        buffer: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(run(service, rx, shutdown));
        (Self { tx }, handle)
    }

    pub fn submit(&self, task: RecordTask) {
        if let Err(e) = self.tx.try_send(task) {
            metrics::counter!("location_check_record_failures_total").increment(1);
            let task = match e {
                mpsc::error::TrySendError::Full(task) | mpsc::error::TrySendError::Closed(task) => task,
            };
            warn!(user_id = %task.user_id, "Check recorder unavailable, dropping location check");
        }
    }
}

async fn run(
    service: Arc<LocationService>,
    mut rx: mpsc::Receiver<RecordTask>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => record_one(&service, task).await,
                None => return,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(task) = rx.recv().await {
        record_one(&service, task).await;
        drained += 1;
    }
    info!(drained, "Check recorder stopped");
}

async fn record_one(service: &LocationService, task: RecordTask) {
    match tokio::time::timeout(RECORD_TIMEOUT, service.record(&task)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            metrics::counter!("location_check_record_failures_total").increment(1);
            error!(user_id = %task.user_id, error = %e, "Failed to record location check");
        }
        Err(_) => {
            metrics::counter!("location_check_record_failures_total").increment(1);
            error!(user_id = %task.user_id, "Recording location check timed out");
        }
    }
}
