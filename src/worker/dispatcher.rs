use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactError, Packager};
use crate::db::models::DeployJob;
use crate::db::{JobStore, StoreError};
use crate::deploy::{DeployError, Deployer};
use crate::synth::{CodeSynthesizer, SynthesisError};

/// Any failure while processing a claimed job.
///
/// The `Display` text is what gets stored in the job's `error` column.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Packaging(#[from] ArtifactError),

    #[error(transparent)]
    Deployment(#[from] DeployError),

    #[error("Job {job_id} was no longer processing when its deployment finished")]
    Superseded { job_id: Uuid },

    #[error("Job processing is shutting down")]
    Stopped,
}

/// Result of one dispatcher invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No pending job was available
    Idle,
    Completed { job_id: Uuid, deployed_url: String },
}

/// Claims one pending job and carries it to a terminal state
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    synthesizer: Arc<dyn CodeSynthesizer>,
    packager: Arc<dyn Packager>,
    deployer: Arc<dyn Deployer>,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        synthesizer: Arc<dyn CodeSynthesizer>,
        packager: Arc<dyn Packager>,
        deployer: Arc<dyn Deployer>,
    ) -> Self {
        Self {
            store,
            synthesizer,
            packager,
            deployer,
        }
    }

    /// Process exactly one pending job, if any.
    ///
    /// Every failure after the claim is written to the job as `failed` before
    /// being returned. A crash before that write leaves the job `processing`
    /// until the stale sweep fails it.
    pub async fn process_next_job(&self) -> Result<ProcessOutcome, JobError> {
        let Some(job) = self.store.claim_next_pending().await? else {
            info!("No pending jobs found");
            return Ok(ProcessOutcome::Idle);
        };

        info!(
            job_id = %job.id,
            function_name = %job.function_name,
            queued_at = %job.created_at,
            "Claimed job"
        );

        match self.build_and_deploy(&job).await {
            Ok(deployed_url) => {
                match self.store.mark_completed(job.id, &deployed_url).await {
                    Ok(true) => {}
                    Ok(false) => {
                        // Someone else (the stale sweep) already finished this job;
                        // a live function must not outlive a failed record.
                        error!(
                            job_id = %job.id,
                            deployed_url = %deployed_url,
                            "Job left processing before its deployment finished, removing function"
                        );
                        if let Err(e) = self.deployer.remove(&job.function_name).await {
                            warn!(
                                job_id = %job.id,
                                function_name = %job.function_name,
                                error = %e,
                                "Error deleting superseded function"
                            );
                        }
                        return Err(JobError::Superseded { job_id: job.id });
                    }
                    Err(e) => {
                        error!(
                            job_id = %job.id,
                            deployed_url = %deployed_url,
                            error = %e,
                            "Function deployed but job could not be marked completed"
                        );
                        return Err(e.into());
                    }
                }
                info!(job_id = %job.id, deployed_url = %deployed_url, "Job completed");
                Ok(ProcessOutcome::Completed {
                    job_id: job.id,
                    deployed_url,
                })
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Job failed");
                match self.store.mark_failed(job.id, &e.to_string()).await {
                    Ok(true) => {}
                    Ok(false) => warn!(job_id = %job.id, "Job was no longer processing when marking failed"),
                    Err(store_err) => error!(
                        job_id = %job.id,
                        error = %store_err,
                        "Failed to record job failure"
                    ),
                }
                Err(e)
            }
        }
    }

    async fn build_and_deploy(&self, job: &DeployJob) -> Result<String, JobError> {
        let generated = self
            .synthesizer
            .synthesize(&job.prompt, &job.clarification)
            .await?;

        let archive = self.packager.package(&generated)?;
        info!(job_id = %job.id, archive_bytes = archive.len(), "Deploying function");

        Ok(self.deployer.deploy(&job.function_name, archive).await?)
    }
}
