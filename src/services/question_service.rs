//! services/question_service.rs
//! Generación de preguntas de entrevista: prompt con doble contexto
//! (oferta + CV) y limpieza de la respuesta del modelo.

use crate::models::work_model::{JobPostingContext, QuestionGenerationRequest, QuestionResult};
use crate::services::ai_service::{ChatMessage, ChatRequest};
use crate::services::task_executor::TaskFailure;

const QUESTION_TYPES: [&str; 3] = ["technical", "behavioral", "situational"];

/// Rotación technical -> behavioral -> situational (número de pregunta 1-indexado)
pub fn question_type_for_round(question_number: u32) -> &'static str {
    let index = if question_number > 0 {
        ((question_number - 1) as usize) % QUESTION_TYPES.len()
    } else {
        0
    };
    QUESTION_TYPES[index]
}

fn type_instruction(question_type: &str) -> &'static str {
    match question_type {
        "behavioral" => "Generate a behavioral interview question using the STAR format (Situation, Task, Action, Result). Ask about past experiences that demonstrate skills relevant to the job. If the candidate's resume is available, reference specific experiences mentioned.",
        "situational" => "Generate a situational interview question presenting a hypothetical scenario related to the job role. Ask how the candidate would handle it. If the candidate's resume is available, make the scenario relevant to their experience level.",
        _ => "Generate a technical interview question that tests specific skills, knowledge, or problem-solving ability relevant to the job requirements. If the candidate's resume is available, reference their background to make the question more personalized.",
    }
}

fn job_context(job: &JobPostingContext) -> String {
    let company = job
        .company
        .as_deref()
        .map(|c| format!(" at {c}"))
        .unwrap_or_default();
    let tech = job
        .tech_stack
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| format!("\nTech Stack: {}", t.join(", ")))
        .unwrap_or_default();
    let level = job
        .experience_level
        .as_deref()
        .map(|l| format!("\nExperience Level: {l}"))
        .unwrap_or_default();

    format!(
        "**Job Role:**\n{}{}\n\n**Job Description:**\n{}{}{}",
        job.title, company, job.description, tech, level
    )
}

pub fn build_question_prompt(req: &QuestionGenerationRequest) -> Result<ChatRequest, TaskFailure> {
    let job = req
        .job_posting
        .as_ref()
        .ok_or_else(|| TaskFailure::precondition("JOB_POSTING_REQUIRED"))?;

    let question_type = question_type_for_round(req.current_question_number + 1);

    let candidate = match req.resume.as_deref().map(str::trim) {
        Some(resume) if !resume.is_empty() => format!("\n**Candidate Background:**\n{resume}"),
        _ => "\n**Candidate Background:**\n(No resume provided - generate question based on job requirements only)".to_string(),
    };

    let language = match job.language.as_deref() {
        Some("ua") => "\n\n**IMPORTANT: Generate the question in UKRAINIAN language. The entire question must be in Ukrainian.**",
        _ => "\n\n**IMPORTANT: Generate the question in ENGLISH language.**",
    };

    let prompt = format!(
        "You are an expert technical interviewer. Generate ONE interview question based on the context below.{language}\n\n\
         {job}\n{candidate}\n\n\
         **Task:**\n{instruction}\n\n\
         **Requirements:**\n\
         - Generate exactly ONE clear, specific question\n\
         - The question should be interview-ready (no meta-text or explanations)\n\
         - Make it relevant to both the job requirements and candidate's background\n\
         - Appropriate difficulty for the experience level\n\
         - Question should be open-ended to encourage detailed responses\n\n\
         Generate the question now:",
        job = job_context(job),
        instruction = type_instruction(question_type),
    );

    Ok(ChatRequest {
        messages: vec![ChatMessage::user(prompt)],
        temperature: 0.7,
        // una sola pregunta no necesita más
        max_tokens: Some(200),
    })
}

/// Quita comillas/espacios sobrantes. Vacío => respuesta inválida.
pub fn parse_question(
    req: &QuestionGenerationRequest,
    raw: &str,
) -> Result<QuestionResult, TaskFailure> {
    let text = raw.trim().trim_matches('"').trim_matches('\'').trim();
    if text.is_empty() {
        return Err(TaskFailure::invalid_response("pregunta vacía tras limpiar"));
    }

    Ok(QuestionResult {
        question_text: text.to_string(),
        question_type: question_type_for_round(req.current_question_number + 1).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(job: Option<JobPostingContext>, resume: Option<&str>) -> QuestionGenerationRequest {
        QuestionGenerationRequest {
            session_id: "s1".into(),
            job_posting: job,
            resume: resume.map(String::from),
            current_question_number: 0,
        }
    }

    fn job() -> JobPostingContext {
        JobPostingContext {
            title: "Backend Engineer".into(),
            company: Some("Acme".into()),
            description: "Build APIs".into(),
            tech_stack: Some(vec!["Rust".into(), "Postgres".into()]),
            experience_level: Some("Senior".into()),
            language: None,
        }
    }

    #[test]
    fn question_types_rotate() {
        assert_eq!(question_type_for_round(0), "technical");
        assert_eq!(question_type_for_round(1), "technical");
        assert_eq!(question_type_for_round(2), "behavioral");
        assert_eq!(question_type_for_round(3), "situational");
        assert_eq!(question_type_for_round(4), "technical");
    }

    #[test]
    fn prompt_carries_job_and_resume_context() {
        let chat = build_question_prompt(&request(Some(job()), Some("10 years of Rust"))).unwrap();
        let prompt = &chat.messages[0].content;
        assert!(prompt.contains("Backend Engineer at Acme"));
        assert!(prompt.contains("Tech Stack: Rust, Postgres"));
        assert!(prompt.contains("10 years of Rust"));
        assert!(prompt.contains("ENGLISH"));
        assert_eq!(chat.max_tokens, Some(200));
    }

    #[test]
    fn prompt_without_resume_says_so() {
        let chat = build_question_prompt(&request(Some(job()), None)).unwrap();
        assert!(chat.messages[0].content.contains("No resume provided"));
    }

    #[test]
    fn missing_job_posting_is_a_precondition_failure() {
        let err = build_question_prompt(&request(None, None)).unwrap_err();
        assert_eq!(err.code, "JOB_POSTING_REQUIRED");
    }

    #[test]
    fn parse_strips_quotes() {
        let req = request(Some(job()), None);
        let q = parse_question(&req, "  \"Tell me about ownership in Rust.\"\n").unwrap();
        assert_eq!(q.question_text, "Tell me about ownership in Rust.");
        assert_eq!(q.question_type, "technical");

        let err = parse_question(&req, " \"\" ").unwrap_err();
        assert_eq!(err.code, "INVALID_RESPONSE");
    }
}
