use std::time::Duration;

use super::platform::PlatformError;

/// Fatal outcomes of a deployment attempt
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Failed to authenticate with the deployment platform: {0}")]
    Authentication(#[source] PlatformError),

    #[error("Failed to generate upload URL")]
    UploadTargetMissing,

    #[error("Failed to generate upload URL: {0}")]
    UploadTarget(#[source] PlatformError),

    #[error("Failed to upload function zip: {0}")]
    Upload(#[source] PlatformError),

    #[error("Failed to initiate cloud function creation")]
    CreationMissingName,

    #[error("Failed to initiate cloud function creation: {0}")]
    Creation(#[source] PlatformError),

    #[error("Deployment failed: {message}")]
    RemoteBuildFailure { message: String },

    #[error(
        "Function deployment timed out after {} minutes ({attempts} status checks)",
        .waited.as_secs() / 60
    )]
    Timeout { attempts: u32, waited: Duration },

    #[error("Deployment did not return a URL")]
    InconsistentRemoteState,

    #[error("Deployment status check failed: {0}")]
    StatusCheck(#[source] PlatformError),

    #[error("Failed to allow public invocation: {0}")]
    Authorization(#[source] PlatformError),

    #[error("Failed to delete function: {0}")]
    Removal(#[source] PlatformError),
}

impl DeployError {
    /// Whether a remote resource may exist and must be deleted.
    ///
    /// Nothing exists before creation is requested. ACTIVE-without-URL is left
    /// in place since the URL may still appear.
    pub fn requires_cleanup(&self) -> bool {
        matches!(
            self,
            Self::CreationMissingName
                | Self::Creation(_)
                | Self::RemoteBuildFailure { .. }
                | Self::Timeout { .. }
                | Self::StatusCheck(_)
                | Self::Authorization(_)
        )
    }
}
