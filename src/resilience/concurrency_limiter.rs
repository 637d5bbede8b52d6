//! resilience/concurrency_limiter.rs
//! Semáforo compartido por todo el proceso que limita las llamadas
//! simultáneas al proveedor de IA. Se crea una vez en `main` y se inyecta.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Slot ocupado. Al salir de scope (éxito, error, timeout, panic o
/// cancelación del future) se devuelve al semáforo.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LimiterSnapshot {
    pub capacity: usize,
    pub available: usize,
    pub in_flight: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        ConcurrencyLimiter {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Espera (sin bloquear el hilo) hasta que haya un slot libre.
    /// Si el future se descarta antes, no se consume ningún slot.
    pub async fn acquire(&self) -> Result<SlotGuard> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| anyhow!("No se pudo adquirir el semaphore (cerrado)"))?;

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Ok(SlotGuard {
            _permit: permit,
            in_flight: self.in_flight.clone(),
        })
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn snapshot(&self) -> LimiterSnapshot {
        LimiterSnapshot {
            capacity: self.capacity,
            available: self.available(),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_returns_slot_on_drop() {
        let limiter = ConcurrencyLimiter::new(2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        assert_eq!(limiter.snapshot().in_flight, 2);

        drop(a);
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.snapshot().in_flight, 1);
    }

    #[tokio::test]
    async fn slot_is_released_when_holder_panics() {
        let limiter = ConcurrencyLimiter::new(1);
        let inner = limiter.clone();
        let handle = tokio::spawn(async move {
            let _guard = inner.acquire().await.unwrap();
            panic!("boom");
        });
        assert!(handle.await.is_err());
        assert_eq!(limiter.available(), 1);
        assert_eq!(limiter.snapshot().in_flight, 0);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        assert_eq!(ConcurrencyLimiter::new(0).snapshot().capacity, 1);
    }
}
