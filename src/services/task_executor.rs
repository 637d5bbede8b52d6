//! services/task_executor.rs
//! Ejecuta una operación de punta a punta en segundo plano:
//! pending -> processing -> completed | failed.
//!
//! Cada llamada al proveedor toma un slot del limitador, corre dentro del
//! deadline por intento y, si falla, se clasifica y se consulta la política
//! de reintentos. Todo el bucle corre dentro del deadline de la tarea.
//! Ningún fallo (ni un panic) escapa de la tarea lanzada.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::FutureExt;
use serde_json::Value;

use crate::models::operation_model::OperationType;
use crate::models::work_model::{ApiKey, WorkPayload, WorkRequest};
use crate::resilience::concurrency_limiter::ConcurrencyLimiter;
use crate::resilience::error_classifier::{classify, ClassifiedError, ErrorKind};
use crate::resilience::error_messages::user_message;
use crate::resilience::retry_policy::RetryPolicy;
use crate::resilience::timeout_guard::{TaskTimedOut, TimeoutGuard};
use crate::services::ai_service::{AiProvider, ChatRequest};
use crate::services::feedback_service::{build_feedback_prompt, parse_feedback};
use crate::services::metrics_service::ErrorMetrics;
use crate::services::operation_service::OperationService;
use crate::services::question_service::{build_question_prompt, parse_question};

/// Fallo final de una tarea: código estable + detalle interno para logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub code: &'static str,
    pub kind: Option<ErrorKind>,
    pub detail: String,
}

impl TaskFailure {
    /// Faltan datos de entrada; no se llega a llamar al proveedor
    pub fn precondition(code: &'static str) -> Self {
        TaskFailure {
            code,
            kind: None,
            detail: format!("precondición no cumplida: {code}"),
        }
    }

    pub fn invalid_response(detail: impl Into<String>) -> Self {
        Self::parse_failed(ErrorKind::InvalidResponseError.code(), detail)
    }

    /// El proveedor respondió, pero el contenido no sirve
    pub fn parse_failed(code: &'static str, detail: impl Into<String>) -> Self {
        TaskFailure {
            code,
            kind: Some(ErrorKind::InvalidResponseError),
            detail: detail.into(),
        }
    }

    pub fn from_classified(classified: &ClassifiedError) -> Self {
        TaskFailure {
            code: classified.code,
            kind: Some(classified.kind),
            detail: classified.message.to_string(),
        }
    }

    pub fn unexpected(detail: impl Into<String>) -> Self {
        TaskFailure {
            code: "UNEXPECTED_ERROR",
            kind: None,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// La tarea quedó corriendo; el resultado se consulta por polling
    Started,
    /// La operación ya no estaba en pending: no se hizo nada
    AlreadyDispatched,
}

#[derive(Clone)]
pub struct TaskExecutor {
    store: OperationService,
    limiter: ConcurrencyLimiter,
    policy: RetryPolicy,
    timeouts: TimeoutGuard,
    provider: Arc<dyn AiProvider>,
    metrics: ErrorMetrics,
}

impl TaskExecutor {
    pub fn new(
        store: OperationService,
        limiter: ConcurrencyLimiter,
        policy: RetryPolicy,
        timeouts: TimeoutGuard,
        provider: Arc<dyn AiProvider>,
        metrics: ErrorMetrics,
    ) -> Self {
        TaskExecutor {
            store,
            limiter,
            policy,
            timeouts,
            provider,
            metrics,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn metrics(&self) -> &ErrorMetrics {
        &self.metrics
    }

    /// Reclama la operación (pending -> processing) y lanza la tarea.
    /// Un despacho duplicado no tiene efectos.
    pub async fn dispatch(&self, op_id: &str, work: WorkRequest) -> Result<DispatchOutcome> {
        let claimed = self
            .store
            .mark_processing(op_id)
            .await
            .with_context(|| format!("No se pudo pasar {op_id} a processing"))?;

        if !claimed {
            log::warn!("(dispatch) [{op_id}] ya no estaba en pending, se ignora");
            return Ok(DispatchOutcome::AlreadyDispatched);
        }

        log::info!(
            "(dispatch) [{op_id}] {} -> processing",
            work.payload.operation_type()
        );

        let executor = self.clone();
        let op_id = op_id.to_string();
        tokio::spawn(async move { executor.run(op_id, work).await });
        Ok(DispatchOutcome::Started)
    }

    async fn run(self, op_id: String, work: WorkRequest) {
        let op_type = work.payload.operation_type();

        let outcome = AssertUnwindSafe(self.timeouts.run_task(self.execute(&op_id, &work)))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Ok(result))) => self.persist_success(&op_id, op_type, &result).await,
            Ok(Ok(Err(failure))) => self.persist_failure(&op_id, op_type, &failure).await,
            Ok(Err(TaskTimedOut(limit))) => {
                log::warn!("[{op_id}] la tarea superó su deadline de {:?}", limit);
                let timeout: ClassifiedError = ErrorKind::TimeoutError.into();
                self.metrics
                    .record(timeout.kind.category(), timeout.code);
                self.persist_failure(&op_id, op_type, &TaskFailure::from_classified(&timeout))
                    .await
            }
            Err(_) => {
                log::error!("[{op_id}] panic dentro de la tarea");
                self.metrics.record("unexpected", "UNEXPECTED_ERROR");
                self.persist_failure(&op_id, op_type, &TaskFailure::unexpected("panic"))
                    .await
            }
        }
    }

    async fn execute(&self, op_id: &str, work: &WorkRequest) -> Result<Value, TaskFailure> {
        match &work.payload {
            WorkPayload::QuestionGeneration(req) => {
                let chat = build_question_prompt(req)?;
                let raw = self.call_with_retry(op_id, &work.api_key, &chat).await?;
                let question = parse_question(req, &raw).map_err(|f| self.record_failure(f))?;
                serde_json::to_value(question).map_err(|e| TaskFailure::unexpected(e.to_string()))
            }
            WorkPayload::FeedbackAnalysis(req) => {
                let chat = build_feedback_prompt(req)?;
                let raw = self.call_with_retry(op_id, &work.api_key, &chat).await?;
                let feedback = parse_feedback(&raw).map_err(|f| self.record_failure(f))?;
                serde_json::to_value(feedback).map_err(|e| TaskFailure::unexpected(e.to_string()))
            }
        }
    }

    fn record_failure(&self, failure: TaskFailure) -> TaskFailure {
        if let Some(kind) = failure.kind {
            self.metrics.record(kind.category(), failure.code);
        }
        failure
    }

    async fn call_with_retry(
        &self,
        op_id: &str,
        api_key: &ApiKey,
        chat: &ChatRequest,
    ) -> Result<String, TaskFailure> {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                // el slot se suelta al salir del bloque, antes del backoff
                let _slot = self
                    .limiter
                    .acquire()
                    .await
                    .map_err(|e| TaskFailure::unexpected(e.to_string()))?;
                self.timeouts
                    .run_attempt(self.provider.chat_completion(api_key, chat))
                    .await
            };

            let raw = match result {
                Ok(text) => return Ok(text),
                Err(raw) => raw,
            };

            let classified = classify(&raw);
            self.metrics
                .record(classified.kind.category(), classified.code);

            if !self.policy.should_retry(classified.kind, attempt) {
                log::warn!(
                    "[{op_id}] intento {} falló con {}, sin más reintentos",
                    attempt + 1,
                    classified.code
                );
                return Err(TaskFailure::from_classified(&classified));
            }

            let delay = self.policy.delay_for(attempt);
            log::warn!(
                "[{op_id}] intento {} falló con {}, reintento en {} ms",
                attempt + 1,
                classified.code,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn persist_success(&self, op_id: &str, op_type: OperationType, result: &Value) {
        match self.store.complete_operation(op_id, result).await {
            Ok(true) => log::info!("[{op_id}] {op_type} completada"),
            Ok(false) => log::warn!("[{op_id}] no estaba en processing, resultado descartado"),
            Err(e) => {
                log::error!("[{op_id}] error guardando resultado: {e}");
                let failure = TaskFailure {
                    code: "DB_WRITE_FAILED",
                    kind: None,
                    detail: e.to_string(),
                };
                self.persist_failure(op_id, op_type, &failure).await;
            }
        }
    }

    async fn persist_failure(&self, op_id: &str, op_type: OperationType, failure: &TaskFailure) {
        let message = user_message(failure.code, op_type);
        log::warn!(
            "[{op_id}] {op_type} falló: code={} detalle={}",
            failure.code,
            failure.detail
        );

        match self.store.fail_operation(op_id, failure.code, &message).await {
            Ok(true) => {}
            Ok(false) => log::warn!("[{op_id}] no estaba en processing, fallo descartado"),
            Err(e) => log::error!("[{op_id}] no se pudo marcar como failed: {e}"),
        }
    }
}
