use actix_web::{HttpResponse, post, web};
use actix_web_validator::Json;
use tracing::error;

use crate::api::job::dto::ClarifyResponse;
use crate::api::job::models::ClarifyRequest;
use crate::api::validation::ErrorResponse;
use crate::synth::{self, TextGenerator};

/// Ask the text-generation service whether the prompt needs clarifying
#[post("/clarify")]
async fn clarify(
    generator: web::Data<dyn TextGenerator>,
    request: Json<ClarifyRequest>,
) -> HttpResponse {
    match synth::clarify(generator.get_ref(), &request.prompt).await {
        Ok(clarification_question) => HttpResponse::Ok().json(ClarifyResponse {
            clarification_question,
        }),
        Err(e) => {
            error!(error = %e, "Error in clarification endpoint");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to process clarification request".to_string(),
                fields: serde_json::json!({"message": "Text generation service error"}),
            })
        }
    }
}

pub fn clarify_config(config: &mut web::ServiceConfig) {
    config.service(clarify);
}
