use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::store::StoreError;

/// Database representation of a deploy job with all fields
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub prompt: String,
    pub clarification: String,
    pub function_name: String,
    pub status: String,
    pub deployed_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Job status as persisted in the `status` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Human-readable progress line shown to polling clients
    pub const fn display_message(&self) -> &'static str {
        match self {
            Self::Pending => "Waiting to start...",
            Self::Processing => "Generating and deploying your API...",
            Self::Completed => "API deployment successful!",
            Self::Failed => "Deployment failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown job status: {s}")),
        }
    }
}

/// Lifecycle position of a job together with the data only that position carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Processing,
    Completed { deployed_url: String },
    Failed { error: String },
}

impl JobState {
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Pending => JobStatus::Pending,
            Self::Processing => JobStatus::Processing,
            Self::Completed { .. } => JobStatus::Completed,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn deployed_url(&self) -> Option<&str> {
        match self {
            Self::Completed { deployed_url } => Some(deployed_url),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { error } => Some(error),
            _ => None,
        }
    }
}

/// A request to generate and deploy one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployJob {
    pub id: Uuid,
    pub prompt: String,
    pub clarification: String,
    pub function_name: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeployJob {
    pub fn status(&self) -> JobStatus {
        self.state.status()
    }
}

impl TryFrom<JobRow> for DeployJob {
    type Error = StoreError;

    /// Rejects rows where `deployed_url`/`error` disagree with `status`.
    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row.status.parse().map_err(|e| {
            StoreError::InvalidRow(format!("job {}: {}", row.id, e))
        })?;

        let state = match (status, row.deployed_url, row.error) {
            (JobStatus::Pending, None, None) => JobState::Pending,
            (JobStatus::Processing, None, None) => JobState::Processing,
            (JobStatus::Completed, Some(deployed_url), None) => JobState::Completed { deployed_url },
            (JobStatus::Failed, None, Some(error)) => JobState::Failed { error },
            (status, url, error) => {
                return Err(StoreError::InvalidRow(format!(
                    "job {}: status {} with deployed_url={:?} error={:?}",
                    row.id, status, url, error
                )));
            }
        };

        Ok(DeployJob {
            id: row.id,
            prompt: row.prompt,
            clarification: row.clarification,
            function_name: row.function_name,
            state,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, deployed_url: Option<&str>, error: Option<&str>) -> JobRow {
        let now = Utc::now();
        JobRow {
            id: Uuid::new_v4(),
            prompt: "an echo api".to_string(),
            clarification: String::new(),
            function_name: "gcf_function_abc".to_string(),
            status: status.to_string(),
            deployed_url: deployed_url.map(str::to_string),
            error: error.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn converts_consistent_rows() {
        let job = DeployJob::try_from(row("completed", Some("https://fn.example"), None)).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.state.deployed_url(), Some("https://fn.example"));
        assert_eq!(job.state.error(), None);

        let job = DeployJob::try_from(row("failed", None, Some("boom"))).unwrap();
        assert_eq!(job.state, JobState::Failed { error: "boom".to_string() });

        let job = DeployJob::try_from(row("processing", None, None)).unwrap();
        assert_eq!(job.state, JobState::Processing);
    }

    #[test]
    fn rejects_rows_breaking_outcome_invariants() {
        assert!(DeployJob::try_from(row("completed", None, None)).is_err());
        assert!(DeployJob::try_from(row("pending", Some("https://fn.example"), None)).is_err());
        assert!(DeployJob::try_from(row("failed", None, None)).is_err());
        assert!(DeployJob::try_from(row("completed", Some("u"), Some("e"))).is_err());
        assert!(DeployJob::try_from(row("queued", None, None)).is_err());
    }

    #[test]
    fn display_messages_cover_every_status() {
        assert_eq!(JobStatus::Pending.display_message(), "Waiting to start...");
        assert_eq!(
            JobStatus::Processing.display_message(),
            "Generating and deploying your API..."
        );
        assert_eq!(JobStatus::Completed.display_message(), "API deployment successful!");
        assert_eq!(JobStatus::Failed.display_message(), "Deployment failed");
    }

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
    }
}
