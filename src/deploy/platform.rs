//! Operations the orchestrator needs from a function hosting platform.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors raised by platform clients and credential providers
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("credential error: {0}")]
    Credentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("platform returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Remote deployment status as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionStatus {
    Active,
    Failed,
    /// Any non-terminal status, e.g. `DEPLOY_IN_PROGRESS`
    InProgress(String),
}

impl From<&str> for FunctionStatus {
    fn from(s: &str) -> Self {
        match s {
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            other => Self::InProgress(other.to_owned()),
        }
    }
}

/// Snapshot of a remote function returned by a status poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFunction {
    pub status: FunctionStatus,
    pub url: Option<String>,
    pub build_error: Option<String>,
}

/// HTTPS trigger settings for function creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsTrigger {
    pub security_level: String,
}

/// Body of a create-function request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,
    pub entry_point: String,
    pub runtime: String,
    pub https_trigger: HttpsTrigger,
    pub source_upload_url: String,
    pub timeout: String,
    pub ingress_settings: String,
}

impl FunctionSpec {
    /// HTTP-triggered `handler` function reachable from anywhere once authorized.
    ///
    /// `SECURE_OPTIONAL` leaves unauthenticated access to be granted separately.
    pub fn http_handler(
        name: impl Into<String>,
        runtime: impl Into<String>,
        source_upload_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            entry_point: "handler".to_owned(),
            runtime: runtime.into(),
            https_trigger: HttpsTrigger {
                security_level: "SECURE_OPTIONAL".to_owned(),
            },
            source_upload_url: source_upload_url.into(),
            timeout: format!("{}s", timeout.as_secs()),
            ingress_settings: "ALLOW_ALL".to_owned(),
        }
    }
}

/// Function hosting platform: upload, create, poll, authorize, delete
#[async_trait]
pub trait FunctionsPlatform: Send + Sync {
    /// Obtain (or refresh) credentials for subsequent calls.
    async fn authenticate(&self) -> Result<(), PlatformError>;

    /// Short-lived upload destination scoped to `parent`; `None` when the platform gave none.
    async fn generate_upload_url(&self, parent: &str) -> Result<Option<String>, PlatformError>;

    /// Transfer the archive to an upload destination.
    async fn upload_archive(
        &self,
        upload_url: &str,
        archive: Vec<u8>,
        max_bytes: u64,
    ) -> Result<(), PlatformError>;

    /// Request creation; returns the operation/resource name if the platform reported one.
    async fn create_function(
        &self,
        parent: &str,
        spec: &FunctionSpec,
    ) -> Result<Option<String>, PlatformError>;

    async fn get_function(&self, name: &str) -> Result<RemoteFunction, PlatformError>;

    /// Bind the invoker role to unauthenticated callers.
    async fn allow_public_invocation(&self, name: &str) -> Result<(), PlatformError>;

    async fn delete_function(&self, name: &str) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_handler_spec_serializes_to_platform_shape() {
        let spec = FunctionSpec::http_handler(
            "projects/p/locations/l/functions/gcf_function_abc",
            "python312",
            "https://upload.example/signed",
            Duration::from_secs(120),
        );

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["entryPoint"], "handler");
        assert_eq!(json["runtime"], "python312");
        assert_eq!(json["httpsTrigger"]["securityLevel"], "SECURE_OPTIONAL");
        assert_eq!(json["sourceUploadUrl"], "https://upload.example/signed");
        assert_eq!(json["timeout"], "120s");
        assert_eq!(json["ingressSettings"], "ALLOW_ALL");
    }

    #[test]
    fn unknown_statuses_are_in_progress() {
        assert_eq!(FunctionStatus::from("ACTIVE"), FunctionStatus::Active);
        assert_eq!(FunctionStatus::from("FAILED"), FunctionStatus::Failed);
        assert_eq!(
            FunctionStatus::from("DEPLOY_IN_PROGRESS"),
            FunctionStatus::InProgress("DEPLOY_IN_PROGRESS".to_owned())
        );
    }
}
