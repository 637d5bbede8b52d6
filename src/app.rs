//! app.rs
use crate::handlers::{ai_handler, metrics_handler, operation_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/operations")
                    .route(
                        "",
                        web::get().to(operation_handler::list_operations_endpoint),
                    )
                    .route(
                        "/question-generation",
                        web::post().to(ai_handler::create_question_generation_endpoint),
                    )
                    .route(
                        "/feedback-analysis",
                        web::post().to(ai_handler::create_feedback_analysis_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(operation_handler::get_operation_endpoint),
                    )
                    .route(
                        "/{id}/retry",
                        web::post().to(operation_handler::retry_operation_endpoint),
                    ),
            )
            .service(
                web::scope("/metrics")
                    .route("/ai-errors", web::get().to(metrics_handler::ai_errors_endpoint)),
            ),
    );
}
