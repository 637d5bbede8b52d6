//! resilience/retry_policy.rs
//! Política de reintentos: qué errores se reintentan y cuánto esperar.
//! Backoff exponencial `base * 2^intento` con jitter uniforme de hasta un 10%.

use std::time::Duration;

use rand::Rng;

use crate::config::executor_config::ExecutorConfig;
use crate::resilience::error_classifier::ErrorKind;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Reintentos máximos (3 => 4 intentos en total)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fracción máxima que se suma al delay (0.1 => hasta +10%)
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_ratio: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &ExecutorConfig) -> Self {
        RetryPolicy {
            max_retries: cfg.max_retries,
            base_delay: Duration::from_millis(cfg.backoff_base_ms),
            max_delay: Duration::from_millis(cfg.backoff_max_ms),
            jitter_ratio: cfg.jitter_ratio,
        }
    }

    /// `attempt` es el número de intento que acaba de fallar (0 = el primero).
    /// Timeout no se reintenta aquí: cuenta contra el deadline de la tarea.
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        let retriable = matches!(kind, ErrorKind::NetworkError | ErrorKind::ServerError);
        retriable && attempt < self.max_retries
    }

    /// Delay sin jitter, ya recortado al máximo
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay con jitter. El recorte se aplica después del jitter, así que
    /// la secuencia es no decreciente y nunca pasa de `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ratio > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter_ratio)
        } else {
            0.0
        };
        self.delay_with_jitter(attempt, jitter)
    }

    fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let raw = self.base_delay_for(attempt).as_secs_f64() * (1.0 + jitter);
        Duration::from_secs_f64(raw).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_only_network_and_server_errors_up_to_three_times() {
        let policy = RetryPolicy::default();
        for kind in ErrorKind::ALL {
            let retriable = matches!(kind, ErrorKind::NetworkError | ErrorKind::ServerError);
            for attempt in 0..3 {
                assert_eq!(policy.should_retry(kind, attempt), retriable, "{kind:?} @ {attempt}");
            }
            assert!(!policy.should_retry(kind, 3), "{kind:?} @ 3");
            assert!(!policy.should_retry(kind, 10), "{kind:?} @ 10");
        }
    }

    #[test]
    fn timeout_is_never_retried_in_task() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ErrorKind::TimeoutError, 0));
    }

    #[test]
    fn delay_stays_within_jitter_band() {
        let policy = RetryPolicy::default();
        for attempt in 0..4 {
            let base = Duration::from_secs(1 << attempt).as_secs_f64();
            for _ in 0..200 {
                let d = policy.delay_for(attempt).as_secs_f64();
                assert!(d >= base, "attempt {attempt}: {d} < {base}");
                assert!(d <= base * 1.1 + 1e-9, "attempt {attempt}: {d} > {}", base * 1.1);
            }
        }
    }

    #[test]
    fn delay_is_non_decreasing_and_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let mut previous = Duration::ZERO;
            for attempt in 0..20 {
                let d = policy.delay_for(attempt);
                assert!(d >= previous, "attempt {attempt}: {d:?} < {previous:?}");
                assert!(d <= policy.max_delay);
                previous = d;
            }
        }
    }

    #[test]
    fn extreme_jitter_values_respect_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_with_jitter(0, 0.0), Duration::from_secs(1));
        assert_eq!(policy.delay_with_jitter(2, 0.1), Duration::from_secs_f64(4.4));
        assert_eq!(policy.delay_with_jitter(5, 0.1), Duration::from_secs(30));
        assert_eq!(policy.base_delay_for(40), Duration::from_secs(30));
    }
}
