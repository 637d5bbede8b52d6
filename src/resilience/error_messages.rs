//! resilience/error_messages.rs
//! Plantillas de mensajes visibles al usuario por código de error.
//! Sin jerga técnica y sin datos sensibles.

use serde::Serialize;

use crate::logger::mask_secrets;
use crate::models::operation_model::OperationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy)]
pub struct ErrorTemplate {
    pub message: &'static str,
    pub action: &'static str,
    /// Si tiene sentido que el usuario pida un reintento manual
    pub retriable: bool,
    pub severity: Severity,
}

const DEFAULT_TEMPLATE: ErrorTemplate = ErrorTemplate {
    message: "An unexpected error occurred while contacting the AI service.",
    action: "Try again. If the problem persists, contact support.",
    retriable: true,
    severity: Severity::Error,
};

pub fn template_for(code: &str) -> ErrorTemplate {
    use Severity::*;

    let (message, action, retriable, severity) = match code {
        "API_KEY_NOT_CONFIGURED" => (
            "Unable to {operation_phrase}. No OpenAI API key is configured.",
            "Add your OpenAI API key in your profile settings, then try again.",
            false,
            Error,
        ),
        "INVALID_API_KEY" => (
            "Unable to {operation_phrase}. Your OpenAI API key appears to be invalid.",
            "Check your OpenAI API key configuration in your profile settings.",
            false,
            Error,
        ),
        "QUOTA_EXCEEDED" => (
            "Unable to {operation_phrase}. Your OpenAI account has exceeded its quota.",
            "Check your OpenAI billing/usage and update your plan, then try again.",
            false,
            Error,
        ),
        "RATE_LIMIT" => (
            "{operation_capitalized} is taking longer than expected due to high demand.",
            "Wait a moment and try again.",
            true,
            Warning,
        ),
        "NETWORK_ERROR" => (
            "Unable to {operation_phrase} because the AI service could not be reached.",
            "Check your internet connection and try again.",
            true,
            Warning,
        ),
        "SERVER_ERROR" => (
            "The AI service is temporarily unavailable.",
            "Try again in a few moments.",
            true,
            Warning,
        ),
        "TIMEOUT" => (
            "{operation_capitalized} took too long and was stopped.",
            "Try again in a few moments.",
            true,
            Warning,
        ),
        "INVALID_RESPONSE" => (
            "The AI service returned an unexpected response.",
            "Try again. If the problem persists, contact support.",
            true,
            Error,
        ),
        "FEEDBACK_PARSE_FAILED" => (
            "We couldn't process the AI feedback response.",
            "Try again. If the problem persists, contact support.",
            true,
            Error,
        ),
        "RESUME_REQUIRED" => (
            "Unable to {operation_phrase}. A resume is required.",
            "Add your resume in your profile settings, then try again.",
            false,
            Error,
        ),
        "JOB_POSTING_REQUIRED" => (
            "Unable to {operation_phrase}. This session is missing its job posting.",
            "Create or select a job posting for this session, then try again.",
            false,
            Error,
        ),
        "NO_ANSWERS" => (
            "Unable to {operation_phrase}. There are no answers to analyze.",
            "Complete at least one interview question, then try again.",
            false,
            Error,
        ),
        "DB_WRITE_FAILED" => (
            "We couldn't save the result of this AI operation.",
            "Try again. If the problem persists, contact support.",
            true,
            Error,
        ),
        _ => return DEFAULT_TEMPLATE,
    };

    ErrorTemplate {
        message,
        action,
        retriable,
        severity,
    }
}

fn operation_phrase(op_type: OperationType) -> &'static str {
    match op_type {
        OperationType::QuestionGeneration => "generate your interview question",
        OperationType::FeedbackAnalysis => "analyze your answer",
    }
}

fn operation_capitalized(op_type: OperationType) -> &'static str {
    match op_type {
        OperationType::QuestionGeneration => "Question generation",
        OperationType::FeedbackAnalysis => "Feedback analysis",
    }
}

/// Mensaje final que se guarda en `operations.error_message`
pub fn user_message(code: &str, op_type: OperationType) -> String {
    let template = template_for(code);
    let render = |t: &str| {
        t.replace("{operation_phrase}", operation_phrase(op_type))
            .replace("{operation_capitalized}", operation_capitalized(op_type))
    };

    let message = render(template.message);
    let action = render(template.action);

    let combined = if action.trim().is_empty() {
        message.trim().to_string()
    } else {
        format!("{}\n\nWhat to do: {}", message.trim(), action.trim())
    };
    mask_secrets(&combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_operation_phrase() {
        let msg = user_message("INVALID_API_KEY", OperationType::QuestionGeneration);
        assert!(msg.starts_with("Unable to generate your interview question."));
        assert!(msg.contains("What to do:"));

        let msg = user_message("RATE_LIMIT", OperationType::FeedbackAnalysis);
        assert!(msg.starts_with("Feedback analysis is taking longer"));
    }

    #[test]
    fn unknown_codes_fall_back_to_default() {
        let msg = user_message("SOMETHING_NEW", OperationType::FeedbackAnalysis);
        assert!(msg.starts_with(DEFAULT_TEMPLATE.message));
        assert!(template_for("SOMETHING_NEW").retriable);
    }

    #[test]
    fn permanent_codes_are_not_retriable() {
        for code in ["INVALID_API_KEY", "QUOTA_EXCEEDED", "RESUME_REQUIRED", "NO_ANSWERS"] {
            assert!(!template_for(code).retriable, "{code}");
        }
        assert_eq!(template_for("SERVER_ERROR").severity, Severity::Warning);
    }
}
