//! logger.rs
//! Configuración del logger usando env_logger.
//!
//! Todo registro pasa por `mask_secrets` antes de escribirse, así que una
//! API key que llegue a un `log::info!` nunca sale en claro.

use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;

const MASK: &str = "***MASKED***";

/// Claves cuyo valor se oculta siempre (`api_key=...`, `"token": "..."`, etc.)
const SENSITIVE_KEYS: &[&str] = &[
    "api_key",
    "apikey",
    "x-openai-key",
    "password",
    "token",
    "secret",
    "authorization",
];

pub fn init_logger() {
    // RUST_LOG manda; si no está, "info".
    let log_env = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_env))
        .format(|buf, record| {
            let message = mask_secrets(&record.args().to_string());
            writeln!(
                buf,
                "[{} {} {}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.target(),
                message
            )
        })
        .init();
}

fn api_key_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bsk-[A-Za-z0-9_\-]{10,}\b").expect("regex de API key inválida")
    })
}

fn bearer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._\-]+").expect("regex de bearer inválida")
    })
}

fn sensitive_pair_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let keys = SENSITIVE_KEYS
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|");
        // key=valor, key: valor, "key": "valor"
        Regex::new(&format!(
            r#"(?i)("?(?:{keys})"?\s*[:=]\s*)("[^"]*"|[^\s,;}}]+)"#
        ))
        .expect("regex de claves sensibles inválida")
    })
}

/// Enmascara patrones comunes de secretos (best-effort, pero aplicado
/// a todo lo que se loguea y a todo mensaje de error visible al cliente).
pub fn mask_secrets(text: &str) -> String {
    let masked = api_key_pattern().replace_all(text, MASK);
    let masked = bearer_pattern().replace_all(&masked, format!("Bearer {MASK}"));
    sensitive_pair_pattern()
        .replace_all(&masked, format!("${{1}}{MASK}"))
        .into_owned()
}
