use actix_web::{
    HttpResponse, Responder, get, post,
    web::{Data, Query, ServiceConfig, scope},
};
use actix_web_validator::Json;
use tracing::error;

use crate::api::ApiSettings;
use crate::worker::DispatchHandle;
use super::dto::ProcessJobsResponse;
use super::models::{StatusQuery, SubmitJobRequest};
use super::service::{JobService, ServiceError};

#[post("")]
async fn submit_job(
    service: Data<JobService>,
    dispatch: Data<DispatchHandle>,
    settings: Data<ApiSettings>,
    request: Json<SubmitJobRequest>,
) -> Result<HttpResponse, ServiceError> {
    let response = service.submit(&request).await?;

    if settings.trigger_on_submit {
        // The job stays pending; a later trigger or /process-jobs picks it up
        if let Err(e) = dispatch.trigger() {
            error!(job_id = %response.job_id, error = %e, "Could not trigger processing after submission");
        }
    }

    Ok(HttpResponse::Created().json(response))
}

#[get("/status")]
async fn job_status(
    service: Data<JobService>,
    query: Query<StatusQuery>,
) -> Result<HttpResponse, ServiceError> {
    let status = service.status(query.job_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// Process exactly one pending job; intended for schedulers and webhooks
#[post("/process-jobs")]
async fn process_jobs(dispatch: Data<DispatchHandle>) -> impl Responder {
    match dispatch.run_now().await {
        Ok(_) => HttpResponse::Ok().json(ProcessJobsResponse::Success),
        Err(e) => {
            error!(error = %e, "Error processing job");
            HttpResponse::InternalServerError().json(ProcessJobsResponse::Error {
                message: e.to_string(),
            })
        }
    }
}

pub fn job_config(config: &mut ServiceConfig) {
    config
        .service(scope("jobs").service(submit_job).service(job_status))
        .service(process_jobs);
}
