//! models/work_model.rs
//! Descripciones del trabajo de IA (lo que se despacha al ejecutor) y
//! los resultados que se guardan en `operations.result`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::operation_model::OperationType;

/// API key del usuario. Solo viaja como parámetro hasta el proveedor:
/// no se serializa y su Debug/Display nunca la muestran.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(ApiKey(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPostingContext {
    pub title: String,
    pub company: Option<String>,
    pub description: String,
    pub tech_stack: Option<Vec<String>>,
    pub experience_level: Option<String>,
    /// "en" (default) o "ua"
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionGenerationRequest {
    pub session_id: String,
    pub job_posting: Option<JobPostingContext>,
    pub resume: Option<String>,
    /// Preguntas ya hechas en la sesión; la nueva es la `current_question_number + 1`
    #[serde(default)]
    pub current_question_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalysisRequest {
    pub session_id: String,
    pub job_posting: Option<JobPostingContext>,
    pub resume: Option<String>,
    #[serde(default)]
    pub qa_pairs: Vec<QaPair>,
}

/// Trabajo a ejecutar. Se persiste tal cual en `work_payload` (no lleva secretos).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation_type", rename_all = "snake_case")]
pub enum WorkPayload {
    QuestionGeneration(QuestionGenerationRequest),
    FeedbackAnalysis(FeedbackAnalysisRequest),
}

impl WorkPayload {
    pub fn operation_type(&self) -> OperationType {
        match self {
            WorkPayload::QuestionGeneration(_) => OperationType::QuestionGeneration,
            WorkPayload::FeedbackAnalysis(_) => OperationType::FeedbackAnalysis,
        }
    }

    /// Clave lógica de la unidad de trabajo (índice único en la tabla)
    pub fn work_key(&self) -> String {
        match self {
            WorkPayload::QuestionGeneration(req) => format!(
                "session:{}:question:{}",
                req.session_id,
                req.current_question_number + 1
            ),
            WorkPayload::FeedbackAnalysis(req) => format!("session:{}:feedback", req.session_id),
        }
    }
}

/// Lo que recibe `TaskExecutor::dispatch`
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub api_key: ApiKey,
    pub payload: WorkPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_text: String,
    pub question_type: String,
}

/// JSON que el modelo debe devolver en el análisis de feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackAnalysis {
    pub technical_accuracy_score: i64,
    pub communication_clarity_score: i64,
    pub problem_solving_score: i64,
    pub relevance_score: i64,
    pub technical_feedback: String,
    pub communication_feedback: String,
    pub problem_solving_feedback: String,
    pub relevance_feedback: String,
    #[serde(default)]
    pub overall_comments: Option<String>,
    pub knowledge_gaps: Vec<String>,
    pub learning_recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResult {
    #[serde(flatten)]
    pub analysis: FeedbackAnalysis,
    pub overall_score: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_never_printed() {
        let key = ApiKey::new("sk-supersecretvalue123").unwrap();
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
        assert_eq!(format!("{key}"), "***");
        assert_eq!(key.expose(), "sk-supersecretvalue123");
        assert!(ApiKey::new("   ").is_none());
    }

    #[test]
    fn work_keys_identify_the_unit_of_work() {
        let question = WorkPayload::QuestionGeneration(QuestionGenerationRequest {
            session_id: "s1".into(),
            job_posting: None,
            resume: None,
            current_question_number: 2,
        });
        assert_eq!(question.work_key(), "session:s1:question:3");
        assert_eq!(question.operation_type(), OperationType::QuestionGeneration);

        let feedback = WorkPayload::FeedbackAnalysis(FeedbackAnalysisRequest {
            session_id: "s1".into(),
            job_posting: None,
            resume: None,
            qa_pairs: vec![],
        });
        assert_eq!(feedback.work_key(), "session:s1:feedback");
    }

    #[test]
    fn payload_is_tagged_by_operation_type() {
        let json = serde_json::json!({
            "operation_type": "feedback_analysis",
            "session_id": "s9",
            "job_posting": null,
            "resume": "Rust dev",
            "qa_pairs": [{"question": "Q?", "answer": "A."}]
        });
        let payload: WorkPayload = serde_json::from_value(json).unwrap();
        assert_eq!(payload.operation_type(), OperationType::FeedbackAnalysis);
    }
}
