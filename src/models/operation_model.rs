use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tipo de trabajo de IA que representa una operación
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    QuestionGeneration,
    FeedbackAnalysis,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::QuestionGeneration => "question_generation",
            OperationType::FeedbackAnalysis => "feedback_analysis",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "question_generation" => Ok(OperationType::QuestionGeneration),
            "feedback_analysis" => Ok(OperationType::FeedbackAnalysis),
            other => Err(format!("operation_type desconocido: {other}")),
        }
    }
}

/// pending -> processing -> completed | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Processing => "processing",
            OperationStatus::Completed => "completed",
            OperationStatus::Failed => "failed",
        }
    }

    #[cfg(test)]
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Completed | OperationStatus::Failed)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationStatus::Pending),
            "processing" => Ok(OperationStatus::Processing),
            "completed" => Ok(OperationStatus::Completed),
            "failed" => Ok(OperationStatus::Failed),
            other => Err(format!("status desconocido: {other}")),
        }
    }
}

/// Fila de la tabla `operations`. Es lo que devuelve el endpoint de polling,
/// salvo `work_key` y `work_payload`, que son internos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: String,
    pub operation_type: OperationType,
    #[serde(skip_serializing)]
    pub work_key: String,
    pub status: OperationStatus,
    pub result: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub parent_operation_id: Option<String>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub work_payload: Option<String>,
}

/// Datos para crear una operación (siempre nace en "pending")
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub operation_type: OperationType,
    pub work_key: String,
    /// JSON sin secretos, para poder reintentar más tarde
    pub work_payload: Option<String>,
    pub parent_operation_id: Option<String>,
    pub retry_count: i64,
}

impl NewOperation {
    pub fn new(operation_type: OperationType, work_key: impl Into<String>) -> Self {
        NewOperation {
            operation_type,
            work_key: work_key.into(),
            work_payload: None,
            parent_operation_id: None,
            retry_count: 0,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.work_payload = Some(payload.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOperationResponse {
    pub id: String,
    pub operation_type: OperationType,
    pub status: OperationStatus,
    pub message: String,
}

/// Para listar operaciones con paginación
#[derive(Debug, Clone, Serialize)]
pub struct ListOperationsResponse {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub items: Vec<OperationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_from_str() {
        for status in [
            OperationStatus::Pending,
            OperationStatus::Processing,
            OperationStatus::Completed,
            OperationStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<OperationStatus>(), Ok(status));
        }
        assert!("running".parse::<OperationStatus>().is_err());
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(!OperationStatus::Pending.is_terminal());
        assert!(!OperationStatus::Processing.is_terminal());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(OperationStatus::Failed.is_terminal());
    }

    #[test]
    fn record_serialization_hides_internal_fields() {
        let now = Utc::now();
        let record = OperationRecord {
            id: "op-1".into(),
            operation_type: OperationType::FeedbackAnalysis,
            work_key: "session:1:feedback".into(),
            status: OperationStatus::Pending,
            result: None,
            error_code: None,
            error_message: None,
            parent_operation_id: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            work_payload: Some("{}".into()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["operation_type"], "feedback_analysis");
        assert_eq!(json["status"], "pending");
        assert!(json["result"].is_null());
        assert!(json.get("work_key").is_none());
        assert!(json.get("work_payload").is_none());
    }
}
