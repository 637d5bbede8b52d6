//! handlers/mod.rs
//! Handlers HTTP: operaciones de IA, polling/reintentos y métricas.
pub mod ai_handler;
pub mod metrics_handler;
pub mod operation_handler;

use actix_web::HttpRequest;
use serde_json::json;

use crate::models::operation_model::OperationType;
use crate::models::work_model::ApiKey;
use crate::resilience::error_messages::{template_for, user_message};

pub const API_KEY_HEADER: &str = "X-OpenAI-Key";

/// Cuerpo de error común: `{code, message}`
pub(crate) fn error_body(code: &str, message: impl Into<String>) -> serde_json::Value {
    json!({ "code": code, "message": message.into() })
}

/// Error con el mensaje de usuario de la plantilla del código
pub(crate) fn user_error_body(code: &str, op_type: OperationType) -> serde_json::Value {
    let template = template_for(code);
    json!({
        "code": code,
        "message": user_message(code, op_type),
        "retriable": template.retriable,
        "severity": template.severity,
    })
}

/// La key viaja por request; nunca se guarda ni se loguea
pub(crate) fn api_key_from(req: &HttpRequest) -> Option<ApiKey> {
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(ApiKey::new)
}
