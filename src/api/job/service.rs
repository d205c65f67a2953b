use std::sync::Arc;

use actix_web::{HttpResponse, ResponseError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::validation::ErrorResponse;
use crate::db::{JobStore, StoreError};
use super::dto::{JobStatusResponse, SubmitJobResponse};
use super::models::SubmitJobRequest;

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Request was well-formed JSON but semantically invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(Uuid),
}

impl ResponseError for ServiceError {
    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Store(e) => {
                error!("Store error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Database error occurred"}),
                })
            }
            ServiceError::Validation(msg) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: msg.clone(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::NotFound(id) => {
                warn!("Job not found: {}", id);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Job not found".to_string(),
                    fields: serde_json::json!({"message": format!("Job with id {} not found", id)}),
                })
            }
        }
    }
}

/// Submission and status queries over the job store
pub struct JobService {
    store: Arc<dyn JobStore>,
}

impl JobService {
    /// Create a new JobService instance
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Enqueue a pending job for the submitted prompt
    pub async fn submit(&self, request: &SubmitJobRequest) -> Result<SubmitJobResponse, ServiceError> {
        let job = self
            .store
            .enqueue(&request.prompt, &request.combined_clarification())
            .await?;

        info!(job_id = %job.id, function_name = %job.function_name, "Job submitted");
        Ok(SubmitJobResponse { job_id: job.id })
    }

    /// Project a job onto its polling view
    ///
    /// `raw_id` is the `jobId` query value; absent or malformed ids are validation errors.
    pub async fn status(&self, raw_id: Option<&str>) -> Result<JobStatusResponse, ServiceError> {
        let raw_id = raw_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::Validation("Missing jobId".to_string()))?;
        let id = Uuid::parse_str(raw_id)
            .map_err(|_| ServiceError::Validation(format!("Invalid jobId: {raw_id}")))?;

        let job = self.store.get(id).await?.ok_or(ServiceError::NotFound(id))?;
        Ok(JobStatusResponse::from(&job))
    }
}
