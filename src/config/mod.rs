//! config/mod.rs
//! Configuración global leída del entorno (.env incluido).

pub mod executor_config;

use std::str::FromStr;

/// Lee una variable de entorno y la parsea; si no existe o no parsea,
/// se usa el default (y se avisa en el log).
pub(crate) fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!(
                    "Valor inválido en {}='{}', usando default {:?}",
                    key,
                    raw,
                    default
                );
                default
            }
        },
        Err(_) => default,
    }
}
