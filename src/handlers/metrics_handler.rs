//! handlers/metrics_handler.rs
use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::services::operation_service::OperationService;
use crate::services::task_executor::TaskExecutor;

/// GET /api/metrics/ai-errors
pub async fn ai_errors_endpoint(
    executor: web::Data<TaskExecutor>,
    op_service: web::Data<OperationService>,
) -> HttpResponse {
    let operations = match op_service.status_counts().await {
        Ok(counts) => counts,
        Err(e) => {
            log::error!("(ai_errors) {e:?}");
            Default::default()
        }
    };

    HttpResponse::Ok().json(json!({
        "errors": executor.metrics().snapshot(),
        "limiter": executor.limiter().snapshot(),
        "operations_by_status": operations,
    }))
}
