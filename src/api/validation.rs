use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Map<String, serde_json::Value>) -> actix_web::Error {
    let error_response = ErrorResponse {
        error: error.to_string(),
        fields: serde_json::Value::Object(fields),
    };
    actix_web::error::InternalError::from_response("", HttpResponse::BadRequest().json(error_response))
        .into()
}

/// JsonConfig with the project-wide 400 body for validation and parse failures
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default()
        .error_handler(|err, _req| {
            let mut fields = serde_json::Map::new();

            match err {
                actix_web_validator::Error::Validate(validation_errors) => {
                    let mut first_message = None;
                    for (field, errors) in validation_errors.field_errors() {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| format!("Validation error in field: {}", field))
                            })
                            .collect();
                        if first_message.is_none() {
                            first_message = messages.first().cloned();
                        }
                        fields.insert(field.to_string(), serde_json::json!({"errors": messages}));
                    }

                    let error = first_message.unwrap_or_else(|| "Validation failed".to_string());
                    bad_request(&error, fields)
                }
                actix_web_validator::Error::Deserialize(de_err) => {
                    let message = if de_err.to_string().contains("EOF while parsing") {
                        "Request body is empty. Expected JSON payload"
                    } else {
                        "Invalid JSON format"
                    };
                    fields.insert("message".to_string(), serde_json::json!(message));
                    bad_request("Request validation failed", fields)
                }
                _ => {
                    fields.insert("message".to_string(), serde_json::json!("Validation error"));
                    bad_request("Validation failed", fields)
                }
            }
        })
}
