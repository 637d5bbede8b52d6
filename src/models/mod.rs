//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod operation_model;
pub mod work_model;
