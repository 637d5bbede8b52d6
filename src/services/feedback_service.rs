//! services/feedback_service.rs
//! Análisis de feedback de una sesión completa: prompt con la transcripción,
//! validación del JSON devuelto y cálculo del puntaje global.

use crate::models::work_model::{FeedbackAnalysis, FeedbackAnalysisRequest, FeedbackResult};
use crate::services::ai_service::{ChatMessage, ChatRequest};
use crate::services::task_executor::TaskFailure;

/// Media de los sub-puntajes redondeada al entero más cercano; un empate
/// (x.5) va al par (62.5 -> 62, 75.5 -> 76). Todo en enteros, sin floats.
pub fn overall_score(scores: &[i64]) -> i64 {
    if scores.is_empty() {
        return 0;
    }
    let n = scores.len() as i64;
    let sum: i64 = scores.iter().sum();
    let quotient = sum.div_euclid(n);
    let twice_rest = 2 * sum.rem_euclid(n);

    if twice_rest > n || (twice_rest == n && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

fn clamp_score(score: i64) -> i64 {
    score.clamp(0, 100)
}

pub fn build_feedback_prompt(req: &FeedbackAnalysisRequest) -> Result<ChatRequest, TaskFailure> {
    let resume = req
        .resume
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| TaskFailure::precondition("RESUME_REQUIRED"))?;
    let job = req
        .job_posting
        .as_ref()
        .ok_or_else(|| TaskFailure::precondition("JOB_POSTING_REQUIRED"))?;
    if req.qa_pairs.is_empty() {
        return Err(TaskFailure::precondition("NO_ANSWERS"));
    }

    let tech_stack = job
        .tech_stack
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| t.join(", "))
        .unwrap_or_else(|| "Not specified".to_string());

    let transcript = req
        .qa_pairs
        .iter()
        .enumerate()
        .map(|(i, pair)| {
            format!(
                "Q{n}: {}\nA{n}: {}",
                pair.question,
                pair.answer.as_deref().unwrap_or("[No answer provided]"),
                n = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!(
        r#"You are an expert technical interviewer analyzing a candidate's interview performance.

JOB POSTING:
Title: {title}
Company: {company}
Description: {description}
Experience Level: {level}
Tech Stack: {tech_stack}

CANDIDATE'S RESUME:
{resume}

INTERVIEW TRANSCRIPT:
{transcript}

Analyze this interview across 4 dimensions and provide scores (0-100) and detailed feedback for each:

1. Technical Accuracy: Correctness of technical concepts, algorithms, and implementation details
2. Communication Clarity: Ability to explain complex concepts clearly and structure responses
3. Problem-Solving Approach: Methodology, analytical thinking, and problem decomposition
4. Relevance to Job Requirements: Alignment with the job posting's requirements and tech stack

Also identify:
- Knowledge Gaps: Specific areas where the candidate showed weaknesses or lack of knowledge
- Learning Recommendations: Concrete suggestions for improvement with specific resources or topics

Respond ONLY with a JSON object (no markdown, no additional text) in this exact format:
{{
  "technical_accuracy_score": 0,
  "communication_clarity_score": 0,
  "problem_solving_score": 0,
  "relevance_score": 0,
  "technical_feedback": "...",
  "communication_feedback": "...",
  "problem_solving_feedback": "...",
  "relevance_feedback": "...",
  "overall_comments": "...",
  "knowledge_gaps": ["..."],
  "learning_recommendations": ["..."]
}}

Ensure all scores are integers between 0 and 100, and provide actionable, specific feedback.
"#,
        title = job.title,
        company = job.company.as_deref().unwrap_or("Not specified"),
        description = job.description,
        level = job.experience_level.as_deref().unwrap_or("Not specified"),
    );

    Ok(ChatRequest {
        messages: vec![ChatMessage::user(prompt)],
        temperature: 0.7,
        max_tokens: None,
    })
}

/// Algunos modelos envuelven el JSON en ```json ... ```
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

pub fn parse_feedback(raw: &str) -> Result<FeedbackResult, TaskFailure> {
    let mut analysis: FeedbackAnalysis = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| TaskFailure::parse_failed("FEEDBACK_PARSE_FAILED", e.to_string()))?;

    analysis.technical_accuracy_score = clamp_score(analysis.technical_accuracy_score);
    analysis.communication_clarity_score = clamp_score(analysis.communication_clarity_score);
    analysis.problem_solving_score = clamp_score(analysis.problem_solving_score);
    analysis.relevance_score = clamp_score(analysis.relevance_score);

    let overall = overall_score(&[
        analysis.technical_accuracy_score,
        analysis.communication_clarity_score,
        analysis.problem_solving_score,
        analysis.relevance_score,
    ]);

    Ok(FeedbackResult {
        analysis,
        overall_score: overall,
    })
}
