use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::error::DeployError;
use super::platform::{FunctionSpec, FunctionStatus, FunctionsPlatform};

/// Upper bound declared to the upload destination (100 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 20;
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Outbound requests one deployment makes besides status polls: synthesis,
/// token, upload URL, upload, create, IAM.
const NON_POLL_REQUESTS: u32 = 6;

/// Where and how functions are deployed
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub project_id: String,
    pub location: String,
    pub runtime: String,
    pub function_timeout: Duration,
    pub max_poll_attempts: u32,
    pub max_backoff: Duration,
    pub max_upload_bytes: u64,
}

impl DeploySettings {
    /// Defaults: 120s function timeout, 20 polls, backoff capped at 300s.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        runtime: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            runtime: runtime.into(),
            function_timeout: Duration::from_secs(120),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// `projects/{project}/locations/{location}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.location)
    }
}

/// Wait before the `attempt`-th status poll: `min(2^attempt s, cap)`.
pub fn backoff_delay(attempt: u32, cap: Duration) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt)).min(cap)
}

/// Total backoff slept across `attempts` polls.
pub fn poll_budget(attempts: u32, cap: Duration) -> Duration {
    (0..attempts).map(|attempt| backoff_delay(attempt, cap)).sum()
}

/// Longest a single job can spend in `processing` when every request runs to
/// its timeout. Anything that fails jobs as abandoned must wait longer.
pub fn worst_case_run_time(attempts: u32, cap: Duration, request_timeout: Duration) -> Duration {
    poll_budget(attempts, cap) + request_timeout * (attempts + NON_POLL_REQUESTS)
}

/// Suspends the poll loop between status checks
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock sleeper backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deploys an archive as a publicly invokable function and returns its URL
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, function_name: &str, archive: Vec<u8>) -> Result<String, DeployError>;

    /// Delete a function this deployer created.
    async fn remove(&self, function_name: &str) -> Result<(), DeployError>;
}

/// Drives a remote function from nonexistent to public, or fails and cleans up.
///
/// Protocol:
/// 1. Authenticate
/// 2. Request an upload destination
/// 3. Upload the archive
/// 4. Request function creation
/// 5. Poll with exponential backoff until ACTIVE, FAILED or the attempt limit
/// 6. On ACTIVE, grant public invocation and return the trigger URL
///
/// Any failure after step 4 (except ACTIVE without a URL) deletes the remote
/// function on a best-effort basis.
pub struct Orchestrator {
    platform: Arc<dyn FunctionsPlatform>,
    sleeper: Arc<dyn Sleeper>,
    settings: DeploySettings,
}

impl Orchestrator {
    pub fn new(
        platform: Arc<dyn FunctionsPlatform>,
        sleeper: Arc<dyn Sleeper>,
        settings: DeploySettings,
    ) -> Self {
        Self {
            platform,
            sleeper,
            settings,
        }
    }

    async fn create_and_await(
        &self,
        parent: &str,
        full_name: &str,
        upload_url: &str,
    ) -> Result<String, DeployError> {
        let spec = FunctionSpec::http_handler(
            full_name,
            &self.settings.runtime,
            upload_url,
            self.settings.function_timeout,
        );

        let operation = self
            .platform
            .create_function(parent, &spec)
            .await
            .map_err(DeployError::Creation)?
            .ok_or(DeployError::CreationMissingName)?;
        info!(function = %full_name, operation = %operation, "Function creation initiated");

        let max_attempts = self.settings.max_poll_attempts;
        let mut waited = Duration::ZERO;
        for attempt in 0..max_attempts {
            let delay = backoff_delay(attempt, self.settings.max_backoff);
            self.sleeper.sleep(delay).await;
            waited += delay;

            let remote = self
                .platform
                .get_function(full_name)
                .await
                .map_err(DeployError::StatusCheck)?;

            match remote.status {
                FunctionStatus::Active => {
                    let url = remote
                        .url
                        .filter(|url| !url.is_empty())
                        .ok_or(DeployError::InconsistentRemoteState)?;

                    self.platform
                        .allow_public_invocation(full_name)
                        .await
                        .map_err(DeployError::Authorization)?;

                    info!(function = %full_name, url = %url, "Function is active and public");
                    return Ok(url);
                }
                FunctionStatus::Failed => {
                    return Err(DeployError::RemoteBuildFailure {
                        message: remote
                            .build_error
                            .unwrap_or_else(|| "Unknown error".to_owned()),
                    });
                }
                FunctionStatus::InProgress(status) => {
                    info!(
                        function = %full_name,
                        status = %status,
                        "Deployment status ({}/{})",
                        attempt + 1,
                        max_attempts
                    );
                }
            }
        }

        Err(DeployError::Timeout {
            attempts: max_attempts,
            waited,
        })
    }

    /// Delete a partially deployed function. Failures are logged, never returned.
    async fn cleanup(&self, full_name: &str, cause: &DeployError) {
        match self.platform.delete_function(full_name).await {
            Ok(()) => info!(function = %full_name, cause = %cause, "Deleted failed function deployment"),
            Err(e) => warn!(
                function = %full_name,
                cause = %cause,
                error = %e,
                "Error deleting failed function"
            ),
        }
    }
}

#[async_trait]
impl Deployer for Orchestrator {
    async fn deploy(&self, function_name: &str, archive: Vec<u8>) -> Result<String, DeployError> {
        self.platform
            .authenticate()
            .await
            .map_err(DeployError::Authentication)?;

        let parent = self.settings.parent();
        let upload_url = self
            .platform
            .generate_upload_url(&parent)
            .await
            .map_err(DeployError::UploadTarget)?
            .ok_or(DeployError::UploadTargetMissing)?;

        self.platform
            .upload_archive(&upload_url, archive, self.settings.max_upload_bytes)
            .await
            .map_err(DeployError::Upload)?;
        debug!(function = %function_name, "Archive uploaded");

        let full_name = format!("{parent}/functions/{function_name}");
        let result = self.create_and_await(&parent, &full_name, &upload_url).await;

        if let Err(e) = &result {
            if e.requires_cleanup() {
                self.cleanup(&full_name, e).await;
            }
        }
        result
    }

    async fn remove(&self, function_name: &str) -> Result<(), DeployError> {
        let full_name = format!("{}/functions/{function_name}", self.settings.parent());
        self.platform
            .delete_function(&full_name)
            .await
            .map_err(DeployError::Removal)?;
        info!(function = %full_name, "Deleted function");
        Ok(())
    }
}
