//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod ai_service;
pub mod feedback_service;
pub mod metrics_service;
pub mod operation_service;
pub mod question_service;
pub mod task_executor;
