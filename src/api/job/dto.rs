use serde::Serialize;
use uuid::Uuid;

use crate::db::models::DeployJob;

/// Response for a job submission
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobResponse {
    pub job_id: Uuid,
}

/// Polling view of a job
#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    /// Human-readable progress line
    pub status: String,
    /// Polling clients read `deployedURL`
    #[serde(rename = "deployedURL", skip_serializing_if = "Option::is_none")]
    pub deployed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DeployJob> for JobStatusResponse {
    fn from(job: &DeployJob) -> Self {
        Self {
            status: job.status().display_message().to_string(),
            deployed_url: job.state.deployed_url().map(str::to_string),
            error: job.state.error().map(str::to_string),
        }
    }
}

/// Response of the processing trigger
#[derive(Serialize, Debug)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessJobsResponse {
    Success,
    Error { message: String },
}

/// Response of the clarification endpoint; empty when no question is needed
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClarifyResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}
