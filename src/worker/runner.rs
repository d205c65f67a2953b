use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{error, info};

use super::dispatcher::{JobDispatcher, JobError, ProcessOutcome};

type RunResult = Result<ProcessOutcome, JobError>;

struct RunRequest {
    reply: Option<oneshot::Sender<RunResult>>,
}

/// Cloneable handle the HTTP layer uses to start dispatcher runs
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<RunRequest>,
}

impl DispatchHandle {
    /// Start a run without waiting for it
    pub fn trigger(&self) -> Result<(), JobError> {
        self.tx
            .send(RunRequest { reply: None })
            .map_err(|_| JobError::Stopped)
    }

    /// Start a run and wait for its result
    pub async fn run_now(&self) -> RunResult {
        let (reply, result) = oneshot::channel();
        self.tx
            .send(RunRequest { reply: Some(reply) })
            .map_err(|_| JobError::Stopped)?;
        result.await.map_err(|_| JobError::Stopped)?
    }
}

/// Owns every dispatcher run started through a [`DispatchHandle`].
///
/// Runs execute on the runtime that drives [`DispatchRunner::run`], not on
/// the HTTP workers, so stopping the server does not cancel them. On shutdown
/// the runner stops accepting requests and waits for in-flight runs.
pub struct DispatchRunner {
    dispatcher: Arc<JobDispatcher>,
    rx: mpsc::UnboundedReceiver<RunRequest>,
}

pub fn dispatch_channel(dispatcher: Arc<JobDispatcher>) -> (DispatchHandle, DispatchRunner) {
    let (tx, rx) = mpsc::unbounded_channel();
    (DispatchHandle { tx }, DispatchRunner { dispatcher, rx })
}

impl DispatchRunner {
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Dispatch runner started");
        let mut runs = JoinSet::new();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                request = self.rx.recv() => match request {
                    Some(request) => {
                        let dispatcher = self.dispatcher.clone();
                        runs.spawn(execute(dispatcher, request));
                    }
                    None => break,
                },
                Some(joined) = runs.join_next(), if !runs.is_empty() => {
                    if let Err(e) = joined {
                        error!("Dispatcher run panicked: {:?}", e);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // Queued but unstarted requests are dropped; their callers see `Stopped`
        self.rx.close();
        info!(in_flight = runs.len(), "Waiting for in-flight dispatcher runs");
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                error!("Dispatcher run panicked: {:?}", e);
            }
        }
        info!("Dispatch runner stopped");
    }
}

async fn execute(dispatcher: Arc<JobDispatcher>, request: RunRequest) {
    let result = dispatcher.process_next_job().await;
    match request.reply {
        Some(reply) => {
            // caller may have gone away; the job state is already recorded
            let _ = reply.send(result);
        }
        None => {
            if let Err(e) = result {
                error!(error = %e, "Triggered job processing failed");
            }
        }
    }
}
