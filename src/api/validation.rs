use actix_web::HttpResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

fn bad_request(error: &str, fields: serde_json::Map<String, serde_json::Value>) -> actix_web::Error {
    actix_web::error::InternalError::from_response(
        "",
        HttpResponse::BadRequest().json(ErrorResponse {
            error: error.to_string(),
            fields: serde_json::Value::Object(fields),
        }),
    )
    .into()
}

/// JSON extractor config shared by every route: malformed bodies come back as a
/// structured 400 instead of a bare text error
pub fn json_config() -> actix_web_validator::JsonConfig {
    actix_web_validator::JsonConfig::default()
        .error_handler(|err, _req| {
            let mut fields = serde_json::Map::new();

            match err {
                actix_web_validator::Error::Validate(validation_errors) => {
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
                        fields.insert(
                            field.to_string(),
                            serde_json::json!({"errors": messages})
                        );
                    }
                    bad_request("Validation failed", fields)
                }
                actix_web_validator::Error::Deserialize(de_err) => {
                    let err_string = de_err.to_string();

                    let message = if err_string.contains("EOF while parsing") {
                        "Request body is empty. Expected JSON payload".to_string()
                    } else if err_string.contains("missing field") {
                        // e.g. "Json deserialize error: missing field `end` at line 1 column 17"
                        err_string
                            .split("missing field")
                            .nth(1)
                            .and_then(|rest| rest.split('`').nth(1))
                            .map(|name| format!("Missing field '{}'", name))
                            .unwrap_or_else(|| "Missing required field".to_string())
                    } else {
                        format!("Invalid JSON: {}", err_string)
                    };
                    fields.insert("message".to_string(), serde_json::json!(message));
                    bad_request("Request validation failed", fields)
                }
                _ => {
                    fields.insert(
                        "message".to_string(),
                        serde_json::json!("Invalid request body")
                    );
                    bad_request("Validation failed", fields)
                }
            }
        })
}
