//! handlers/operation_handler.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::handlers::ai_handler::{accepted, store_error_response};
use crate::handlers::{api_key_from, error_body, user_error_body};
use crate::models::operation_model::OperationStatus;
use crate::models::work_model::{WorkPayload, WorkRequest};
use crate::services::operation_service::OperationService;
use crate::services::task_executor::TaskExecutor;

#[derive(Deserialize)]
pub struct PaginationQuery {
    page: Option<u64>,
    page_size: Option<u64>,
}

/// GET /api/operations
pub async fn list_operations_endpoint(
    op_service: web::Data<OperationService>,
    query: web::Query<PaginationQuery>,
) -> HttpResponse {
    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(10);

    match op_service.list_operations(page, page_size).await {
        Ok(list) => HttpResponse::Ok().json(list),
        Err(e) => {
            log::error!("(list_operations) {e:?}");
            HttpResponse::InternalServerError()
                .json(error_body("UNEXPECTED_ERROR", "Internal server error"))
        }
    }
}

/// GET /api/operations/{id}
/// Solo lectura. Un id inexistente o mal formado es 404.
pub async fn get_operation_endpoint(
    op_service: web::Data<OperationService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();

    match op_service.get_operation(&op_id).await {
        Ok(op_record) => HttpResponse::Ok().json(op_record),
        Err(e) => store_error_response(e),
    }
}

/// POST /api/operations/{id}/retry
/// Crea una operación hija de una fallida y la despacha con la key del request.
pub async fn retry_operation_endpoint(
    req: HttpRequest,
    op_service: web::Data<OperationService>,
    executor: web::Data<TaskExecutor>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();

    let original = match op_service.get_operation(&op_id).await {
        Ok(record) => record,
        Err(e) => return store_error_response(e),
    };
    if original.status != OperationStatus::Failed {
        return HttpResponse::BadRequest().json(error_body(
            "OPERATION_NOT_RETRIABLE",
            format!(
                "Solo se pueden reintentar operaciones fallidas (status actual: {})",
                original.status
            ),
        ));
    }

    let Some(api_key) = api_key_from(&req) else {
        return HttpResponse::BadRequest()
            .json(user_error_body("API_KEY_NOT_CONFIGURED", original.operation_type));
    };

    // sin payload guardado no hay nada que volver a ejecutar
    let payload = original
        .work_payload
        .as_deref()
        .and_then(|raw| serde_json::from_str::<WorkPayload>(raw).ok());
    let Some(payload) = payload else {
        return HttpResponse::BadRequest().json(error_body(
            "OPERATION_NOT_RETRIABLE",
            "La operación no guarda datos suficientes para reintentarla",
        ));
    };

    let retried = match op_service.retry_operation(&op_id).await {
        Ok(record) => record,
        Err(e) => return store_error_response(e),
    };

    let work = WorkRequest { api_key, payload };
    accepted(&executor, &retried.id, retried.operation_type, work).await
}
