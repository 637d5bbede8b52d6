//! tests/mod.rs
//! Pruebas de integración del ejecutor y de la API HTTP.

pub mod common;
