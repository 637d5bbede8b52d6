//! resilience/error_classifier.rs
//! Clasifica cualquier fallo de una llamada al proveedor de IA en un
//! conjunto cerrado de tipos. Es puro: sin I/O, sin logs.

use serde::Serialize;

/// Taxonomía fija de errores del proveedor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NetworkError,
    AuthenticationError,
    RateLimitError,
    ServerError,
    InvalidResponseError,
    QuotaExceededError,
    TimeoutError,
}

impl ErrorKind {
    #[cfg(test)]
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::NetworkError,
        ErrorKind::AuthenticationError,
        ErrorKind::RateLimitError,
        ErrorKind::ServerError,
        ErrorKind::InvalidResponseError,
        ErrorKind::QuotaExceededError,
        ErrorKind::TimeoutError,
    ];

    /// Código estable que ve el cliente en `error_code`
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::AuthenticationError => "INVALID_API_KEY",
            ErrorKind::RateLimitError => "RATE_LIMIT",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::InvalidResponseError => "INVALID_RESPONSE",
            ErrorKind::QuotaExceededError => "QUOTA_EXCEEDED",
            ErrorKind::TimeoutError => "TIMEOUT",
        }
    }

    /// Categoría para las métricas
    pub fn category(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network",
            ErrorKind::AuthenticationError => "authentication",
            ErrorKind::RateLimitError => "rate_limit",
            ErrorKind::ServerError => "server",
            ErrorKind::InvalidResponseError => "invalid_response",
            ErrorKind::QuotaExceededError => "quota",
            ErrorKind::TimeoutError => "timeout",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "Network error connecting to the AI service.",
            ErrorKind::AuthenticationError => "Invalid OpenAI API key. Please update it in settings.",
            ErrorKind::RateLimitError => "AI service rate limit exceeded. Please wait and try again.",
            ErrorKind::ServerError => "AI service temporarily unavailable.",
            ErrorKind::InvalidResponseError => "Unexpected response from the AI service.",
            ErrorKind::QuotaExceededError => "AI quota exceeded. Please check your plan/billing.",
            ErrorKind::TimeoutError => "The AI service did not respond in time.",
        }
    }
}

/// Fallo crudo de un intento, tal como lo reporta el cliente HTTP.
/// Puede contener el body de upstream: nunca se devuelve al cliente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFailure {
    Http { status: u16, body: String },
    Connection(String),
    AttemptTimeout,
    EmptyResponse,
    MalformedResponse(String),
    Other(String),
}

/// Resultado de la clasificación: tipo + código + mensaje seguro
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub message: &'static str,
}

impl From<ErrorKind> for ClassifiedError {
    fn from(kind: ErrorKind) -> Self {
        ClassifiedError {
            kind,
            code: kind.code(),
            message: kind.message(),
        }
    }
}

/// Orden de prioridad: auth, rate limit, cuota, red, 5xx, respuesta inválida.
pub fn classify(failure: &RawFailure) -> ClassifiedError {
    let kind = match failure {
        RawFailure::Http { status, body } => classify_http(*status, body),
        RawFailure::Connection(_) => ErrorKind::NetworkError,
        RawFailure::AttemptTimeout => ErrorKind::TimeoutError,
        RawFailure::EmptyResponse | RawFailure::MalformedResponse(_) => {
            ErrorKind::InvalidResponseError
        }
        RawFailure::Other(text) => classify_text(text),
    };
    kind.into()
}

fn classify_http(status: u16, body: &str) -> ErrorKind {
    let body = body.to_lowercase();

    if status == 401 || has_credential_signal(&body) {
        return ErrorKind::AuthenticationError;
    }
    if status == 429 || has_rate_limit_signal(&body) {
        return ErrorKind::RateLimitError;
    }
    if has_quota_signal(&body) {
        return ErrorKind::QuotaExceededError;
    }
    if (500..=599).contains(&status) {
        return ErrorKind::ServerError;
    }
    ErrorKind::InvalidResponseError
}

/// Para fallos que solo traen texto (errores de librería, mensajes sueltos)
fn classify_text(text: &str) -> ErrorKind {
    let text = text.to_lowercase();

    if text.contains("401") || text.contains("unauthorized") || has_credential_signal(&text) {
        ErrorKind::AuthenticationError
    } else if text.contains("429") || has_rate_limit_signal(&text) {
        ErrorKind::RateLimitError
    } else if has_quota_signal(&text) {
        ErrorKind::QuotaExceededError
    } else if ["connection", "connect", "dns", "socket", "broken pipe", "reset by peer"]
        .iter()
        .any(|s| text.contains(s))
    {
        ErrorKind::NetworkError
    } else {
        ErrorKind::InvalidResponseError
    }
}

fn has_credential_signal(text: &str) -> bool {
    text.contains("invalid_api_key") || text.contains("incorrect api key") || text.contains("invalid api key")
}

fn has_rate_limit_signal(text: &str) -> bool {
    text.contains("rate_limit") || text.contains("rate limit")
}

fn has_quota_signal(text: &str) -> bool {
    text.contains("insufficient_quota") || text.contains("quota")
}
