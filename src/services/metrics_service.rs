//! services/metrics_service.rs
//! Contadores en memoria de errores del proveedor de IA, por categoría y
//! por código.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    by_category: BTreeMap<String, u64>,
    by_error_code: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCountsSnapshot {
    pub total: u64,
    pub by_category: BTreeMap<String, u64>,
    pub by_error_code: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Default)]
pub struct ErrorMetrics {
    counters: Arc<Mutex<Counters>>,
}

impl ErrorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: &str, error_code: &str) {
        // un lock envenenado solo significa que otro hilo paniqueó contando
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counters.by_category.entry(category.to_string()).or_insert(0) += 1;
        *counters.by_error_code.entry(error_code.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> ErrorCountsSnapshot {
        let counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        ErrorCountsSnapshot {
            total: counters.by_error_code.values().sum(),
            by_category: counters.by_category.clone(),
            by_error_code: counters.by_error_code.clone(),
        }
    }
}
