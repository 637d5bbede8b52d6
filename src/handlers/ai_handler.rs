//! handlers/ai_handler.rs
//! Crea la operación y la despacha. Responde 202 con el id para hacer polling.
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::handlers::{api_key_from, error_body, user_error_body};
use crate::models::operation_model::{
    CreateOperationResponse, NewOperation, OperationStatus, OperationType,
};
use crate::models::work_model::{
    FeedbackAnalysisRequest, QuestionGenerationRequest, WorkPayload, WorkRequest,
};
use crate::services::operation_service::{OperationService, StoreError};
use crate::services::task_executor::{DispatchOutcome, TaskExecutor};

/// POST /api/operations/question-generation
pub async fn create_question_generation_endpoint(
    req: HttpRequest,
    body: web::Json<QuestionGenerationRequest>,
    op_service: web::Data<OperationService>,
    executor: web::Data<TaskExecutor>,
) -> HttpResponse {
    submit(
        &req,
        WorkPayload::QuestionGeneration(body.into_inner()),
        &op_service,
        &executor,
    )
    .await
}

/// POST /api/operations/feedback-analysis
pub async fn create_feedback_analysis_endpoint(
    req: HttpRequest,
    body: web::Json<FeedbackAnalysisRequest>,
    op_service: web::Data<OperationService>,
    executor: web::Data<TaskExecutor>,
) -> HttpResponse {
    submit(
        &req,
        WorkPayload::FeedbackAnalysis(body.into_inner()),
        &op_service,
        &executor,
    )
    .await
}

async fn submit(
    req: &HttpRequest,
    payload: WorkPayload,
    op_service: &OperationService,
    executor: &TaskExecutor,
) -> HttpResponse {
    let op_type = payload.operation_type();

    let Some(api_key) = api_key_from(req) else {
        return HttpResponse::BadRequest()
            .json(user_error_body("API_KEY_NOT_CONFIGURED", op_type));
    };

    let serialized = match serde_json::to_string(&payload) {
        Ok(s) => s,
        Err(e) => {
            log::error!("(submit) No se pudo serializar el payload: {e}");
            return HttpResponse::InternalServerError()
                .json(error_body("UNEXPECTED_ERROR", "Internal server error"));
        }
    };

    let new_op = NewOperation::new(op_type, payload.work_key()).with_payload(serialized);
    let record = match op_service.create_operation(new_op).await {
        Ok(record) => record,
        Err(e) => return store_error_response(e),
    };

    let work = WorkRequest { api_key, payload };
    accepted(executor, &record.id, op_type, work).await
}

/// Despacha y arma la respuesta 202
pub(crate) async fn accepted(
    executor: &TaskExecutor,
    op_id: &str,
    op_type: OperationType,
    work: WorkRequest,
) -> HttpResponse {
    match executor.dispatch(op_id, work).await {
        Ok(DispatchOutcome::Started) | Ok(DispatchOutcome::AlreadyDispatched) => {
            HttpResponse::Accepted().json(CreateOperationResponse {
                id: op_id.to_string(),
                operation_type: op_type,
                status: OperationStatus::Processing,
                message: format!("{op_type} en curso, consultar /api/operations/{op_id}"),
            })
        }
        Err(e) => {
            log::error!("(accepted) No se pudo despachar {op_id}: {e:?}");
            HttpResponse::InternalServerError()
                .json(error_body("UNEXPECTED_ERROR", "Internal server error"))
        }
    }
}

pub(crate) fn store_error_response(e: StoreError) -> HttpResponse {
    match e {
        StoreError::Conflict {
            existing_id,
            work_key,
        } => {
            let mut body = json!({
                "code": "OPERATION_CONFLICT",
                "message": format!("Ya existe una operación activa para '{work_key}'"),
            });
            if let Some(id) = existing_id {
                body["existing_operation_id"] = json!(id);
            }
            HttpResponse::Conflict().json(body)
        }
        StoreError::NotFound(id) => HttpResponse::NotFound().json(error_body(
            "OPERATION_NOT_FOUND",
            format!("Operation not found: {id}"),
        )),
        StoreError::NotRetriable(status) => HttpResponse::BadRequest().json(error_body(
            "OPERATION_NOT_RETRIABLE",
            format!("Solo se pueden reintentar operaciones fallidas (status actual: {status})"),
        )),
        other => {
            log::error!("(store) {other:?}");
            HttpResponse::InternalServerError()
                .json(error_body("DB_WRITE_FAILED", "Internal server error"))
        }
    }
}
