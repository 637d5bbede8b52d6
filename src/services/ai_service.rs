//! services/ai_service.rs
//! Cliente del proveedor de IA (chat completions estilo OpenAI).
//!
//! La API key entra como parámetro en cada llamada; el servicio no la guarda.
//! Los fallos se devuelven crudos (`RawFailure`) y los clasifica el ejecutor.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::executor_config::ProviderConfig;
use crate::models::work_model::ApiKey;
use crate::resilience::error_classifier::RawFailure;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Colaborador externo: una petición, una respuesta de texto o un fallo.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn chat_completion(
        &self,
        api_key: &ApiKey,
        request: &ChatRequest,
    ) -> Result<String, RawFailure>;
}

#[derive(Clone)]
pub struct OpenAiService {
    http_client: Client,
    config: ProviderConfig,
}

impl OpenAiService {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
        }
    }
}

/// Extrae `choices[0].message.content` de la respuesta
fn extract_content(body: &Value) -> Result<String, RawFailure> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| {
            RawFailure::MalformedResponse("falta choices[0].message.content".to_string())
        })?;

    if content.trim().is_empty() {
        return Err(RawFailure::EmptyResponse);
    }
    Ok(content.to_string())
}

fn map_send_error(e: reqwest::Error) -> RawFailure {
    if e.is_timeout() {
        RawFailure::AttemptTimeout
    } else if e.is_connect() || e.is_request() {
        RawFailure::Connection(e.without_url().to_string())
    } else {
        RawFailure::Other(e.without_url().to_string())
    }
}

#[async_trait]
impl AiProvider for OpenAiService {
    async fn chat_completion(
        &self,
        api_key: &ApiKey,
        request: &ChatRequest,
    ) -> Result<String, RawFailure> {
        let mut payload = serde_json::json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
        });
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = Value::from(max_tokens);
        }

        log::debug!(
            "(chat_completion) POST model={} mensajes={}",
            self.config.model,
            request.messages.len()
        );

        let resp = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RawFailure::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .json::<Value>()
            .await
            .map_err(|e| RawFailure::MalformedResponse(e.without_url().to_string()))?;

        let tokens_used = body
            .get("usage")
            .and_then(|u| u.get("total_tokens"))
            .and_then(|t| t.as_u64())
            .unwrap_or(0);
        log::debug!("(chat_completion) OK tokens_used={}", tokens_used);

        extract_content(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_first_choice_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hola"}}]});
        assert_eq!(extract_content(&body), Ok("Hola".to_string()));
    }

    #[test]
    fn empty_and_malformed_bodies_are_rejected() {
        let empty = json!({"choices": [{"message": {"content": "   "}}]});
        assert_eq!(extract_content(&empty), Err(RawFailure::EmptyResponse));

        let malformed = json!({"data": []});
        assert!(matches!(
            extract_content(&malformed),
            Err(RawFailure::MalformedResponse(_))
        ));
    }

    #[actix_rt::test]
    async fn unreachable_provider_is_a_connection_failure() {
        let service = OpenAiService::new(ProviderConfig {
            // puerto reservado, nadie escucha
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            model: "test".to_string(),
        });
        let key = ApiKey::new("sk-test-0000000000").unwrap();
        let request = ChatRequest {
            messages: vec![ChatMessage::user("hola")],
            temperature: 0.7,
            max_tokens: None,
        };

        let err = service.chat_completion(&key, &request).await.unwrap_err();
        assert!(matches!(err, RawFailure::Connection(_)), "{err:?}");
    }
}
