//! config/executor_config.rs
//! Límites de concurrencia, timeouts y reintentos para las llamadas a la IA,
//! más la configuración del proveedor y del servidor HTTP.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::env_or;

/// Configuración del ejecutor de operaciones, con valores por defecto
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub max_concurrent_calls: usize, // llamadas simultáneas al proveedor
    pub attempt_timeout_secs: u64,   // deadline de un intento
    pub task_timeout_secs: u64,      // deadline de toda la tarea (con reintentos)
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub jitter_ratio: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            max_concurrent_calls: 5,
            attempt_timeout_secs: 30,
            task_timeout_secs: 120,
            max_retries: 3,
            backoff_base_ms: 1_000,
            backoff_max_ms: 30_000,
            jitter_ratio: 0.1,
        }
    }
}

impl ExecutorConfig {
    pub fn from_env() -> Self {
        let d = ExecutorConfig::default();
        ExecutorConfig {
            max_concurrent_calls: env_or("AI_MAX_CONCURRENT_CALLS", d.max_concurrent_calls).max(1),
            attempt_timeout_secs: env_or("AI_ATTEMPT_TIMEOUT_SECS", d.attempt_timeout_secs),
            task_timeout_secs: env_or("AI_TASK_TIMEOUT_SECS", d.task_timeout_secs),
            max_retries: env_or("AI_MAX_RETRIES", d.max_retries),
            backoff_base_ms: env_or("AI_BACKOFF_BASE_MS", d.backoff_base_ms).max(1),
            backoff_max_ms: env_or("AI_BACKOFF_MAX_MS", d.backoff_max_ms),
            jitter_ratio: env_or("AI_JITTER_RATIO", d.jitter_ratio).max(0.0),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }
}

/// Proveedor compatible con la API de chat completions de OpenAI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_url: String,
    pub model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        let d = ProviderConfig::default();
        ProviderConfig {
            api_url: env_or("OPENAI_API_URL", d.api_url),
            model: env_or("OPENAI_MODEL", d.model),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// None => ./data/operations.db
    pub database_url: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        ServerConfig {
            host: env_or("SERVER_HOST", "0.0.0.0".to_string()),
            port: env_or("SERVER_PORT", 5022u16),
            database_url: std::env::var("DATABASE_URL").ok(),
        }
    }
}
