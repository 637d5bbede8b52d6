//! tests/common.rs
//! Utilidades compartidas: SQLite en memoria y un proveedor de IA guionado.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::models::operation_model::{NewOperation, OperationRecord, OperationStatus};
use crate::models::work_model::{
    ApiKey, FeedbackAnalysisRequest, JobPostingContext, QaPair, QuestionGenerationRequest,
    WorkPayload, WorkRequest,
};
use crate::resilience::concurrency_limiter::ConcurrencyLimiter;
use crate::resilience::error_classifier::RawFailure;
use crate::resilience::retry_policy::RetryPolicy;
use crate::resilience::timeout_guard::TimeoutGuard;
use crate::services::ai_service::{AiProvider, ChatRequest};
use crate::services::metrics_service::ErrorMetrics;
use crate::services::operation_service::OperationService;
use crate::services::task_executor::TaskExecutor;

pub const TEST_KEY: &str = "sk-test-abcdefghijklmnop";

/// Una sola conexión que no expira: cada conexión nueva a `sqlite::memory:`
/// sería otra base vacía.
pub async fn memory_pool() -> Pool<Sqlite> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("No se pudo abrir SQLite en memoria")
}

/// Qué hace el proveedor falso en una llamada
#[derive(Debug, Clone)]
pub enum Step {
    Reply(String),
    Fail(RawFailure),
    /// No responde nunca (lo corta algún deadline)
    Hang,
    Panic,
}

pub fn http_failure(status: u16, body: &str) -> Step {
    Step::Fail(RawFailure::Http {
        status,
        body: body.to_string(),
    })
}

pub struct FakeProvider {
    script: Mutex<VecDeque<Step>>,
    /// Lo que se hace cuando el guion se acaba
    fallback: Step,
    latency: Duration,
    calls: AtomicUsize,
    current: Arc<AtomicUsize>,
    peak: AtomicUsize,
    seen_keys: Mutex<Vec<String>>,
    started_at: Mutex<Vec<Instant>>,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeProvider {
    pub fn scripted(steps: Vec<Step>) -> Self {
        FakeProvider {
            script: Mutex::new(steps.into()),
            fallback: Step::Reply("Fallback question?".to_string()),
            latency: Duration::ZERO,
            calls: AtomicUsize::new(0),
            current: Arc::new(AtomicUsize::new(0)),
            peak: AtomicUsize::new(0),
            seen_keys: Mutex::new(Vec::new()),
            started_at: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        let mut provider = Self::scripted(Vec::new());
        provider.fallback = step;
        provider
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn seen_keys(&self) -> Vec<String> {
        self.seen_keys.lock().unwrap().clone()
    }

    /// Tiempo entre el inicio de cada llamada y el de la siguiente
    pub fn gaps_between_calls(&self) -> Vec<Duration> {
        let started = self.started_at.lock().unwrap();
        started.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

#[async_trait]
impl AiProvider for FakeProvider {
    async fn chat_completion(
        &self,
        api_key: &ApiKey,
        _request: &ChatRequest,
    ) -> Result<String, RawFailure> {
        self.started_at.lock().unwrap().push(Instant::now());
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight(self.current.clone());

        self.seen_keys.lock().unwrap().push(api_key.expose().to_string());
        let step = {
            let mut script = self.script.lock().unwrap();
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match step {
            Step::Reply(text) => Ok(text),
            Step::Fail(failure) => Err(failure),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(RawFailure::Other("nunca debería llegar".to_string()))
            }
            Step::Panic => panic!("proveedor falso explotó"),
        }
    }
}

pub struct Harness {
    pub store: OperationService,
    pub executor: TaskExecutor,
    pub provider: Arc<FakeProvider>,
    pub limiter: ConcurrencyLimiter,
}

/// Backoff corto para que los tests de reintentos no tarden segundos
pub fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
        jitter_ratio: 0.1,
    }
}

pub async fn harness_with(
    provider: FakeProvider,
    capacity: usize,
    timeouts: TimeoutGuard,
) -> Harness {
    let store = OperationService::new(memory_pool().await);
    store.run_migrations().await.unwrap();

    let provider = Arc::new(provider);
    let limiter = ConcurrencyLimiter::new(capacity);
    let executor = TaskExecutor::new(
        store.clone(),
        limiter.clone(),
        fast_retry_policy(),
        timeouts,
        provider.clone(),
        ErrorMetrics::new(),
    );

    Harness {
        store,
        executor,
        provider,
        limiter,
    }
}

pub async fn harness(provider: FakeProvider) -> Harness {
    harness_with(
        provider,
        5,
        TimeoutGuard::new(Duration::from_secs(2), Duration::from_secs(5)),
    )
    .await
}

pub fn job_posting() -> JobPostingContext {
    JobPostingContext {
        title: "Backend Engineer".to_string(),
        company: Some("Acme".to_string()),
        description: "Build and run HTTP services".to_string(),
        tech_stack: Some(vec!["Rust".to_string(), "SQLite".to_string()]),
        experience_level: Some("Senior".to_string()),
        language: None,
    }
}

pub fn question_payload(session: &str, current_question_number: u32) -> WorkPayload {
    WorkPayload::QuestionGeneration(QuestionGenerationRequest {
        session_id: session.to_string(),
        job_posting: Some(job_posting()),
        resume: Some("Five years writing Rust services".to_string()),
        current_question_number,
    })
}

pub fn feedback_payload(session: &str) -> WorkPayload {
    WorkPayload::FeedbackAnalysis(FeedbackAnalysisRequest {
        session_id: session.to_string(),
        job_posting: Some(job_posting()),
        resume: Some("Five years writing Rust services".to_string()),
        qa_pairs: vec![QaPair {
            question: "How does ownership work?".to_string(),
            answer: Some("Each value has a single owner.".to_string()),
        }],
    })
}

pub fn work(payload: WorkPayload) -> WorkRequest {
    WorkRequest {
        api_key: ApiKey::new(TEST_KEY).unwrap(),
        payload,
    }
}

/// Crea la operación en pending tal como lo hace el handler
pub async fn create_for(store: &OperationService, payload: &WorkPayload) -> OperationRecord {
    let new_op = NewOperation::new(payload.operation_type(), payload.work_key())
        .with_payload(serde_json::to_string(payload).unwrap());
    store.create_operation(new_op).await.unwrap()
}

/// Polling hasta ver un estado terminal (como haría un cliente)
pub async fn wait_terminal(store: &OperationService, op_id: &str) -> OperationRecord {
    for _ in 0..500 {
        let record = store.get_operation(op_id).await.unwrap();
        if record.status.is_terminal() {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("la operación {op_id} no terminó a tiempo");
}

pub fn assert_terminal_invariant(record: &OperationRecord) {
    match record.status {
        OperationStatus::Completed => {
            assert!(record.result.is_some());
            assert!(record.error_code.is_none() && record.error_message.is_none());
        }
        OperationStatus::Failed => {
            assert!(record.result.is_none());
            assert!(record.error_code.is_some() && record.error_message.is_some());
        }
        other => panic!("estado no terminal: {other}"),
    }
}
