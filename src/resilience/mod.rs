//! resilience/mod.rs
//! Piezas para llamar a un proveedor lento y poco fiable: clasificación de
//! errores, reintentos, límite de concurrencia y timeouts.

pub mod concurrency_limiter;
pub mod error_classifier;
pub mod error_messages;
pub mod retry_policy;
pub mod timeout_guard;
