use crate::error::GenerationFailure;
use crate::Result;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub consecutive_failures: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

impl CircuitBreakerSnapshot {
    pub fn is_open(&self) -> bool {
        self.open_remaining_ms.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set the cooldown duration
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Defaults overridden by env:
    /// - `GENCACHE_BREAKER_FAILURE_THRESHOLD` (default 5)
    /// - `GENCACHE_BREAKER_COOLDOWN_SECS` (default 30)
    ///
    /// Unparsable values keep the default.
    pub fn from_env() -> Result<Self> {
        let threshold = std::env::var("GENCACHE_BREAKER_FAILURE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(5);
        let cooldown_secs = std::env::var("GENCACHE_BREAKER_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Ok(Self::new()
            .with_failure_threshold(threshold)
            .with_cooldown(Duration::from_secs(cooldown_secs.max(1))))
    }
}

#[derive(Debug)]
struct State {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Minimal circuit breaker around the external generator.
///
/// - Counts consecutive generation failures
/// - Opens for a cooldown duration after threshold
/// - While open, callers are served fallbacks without touching the generator
#[derive(Debug)]
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                consecutive_failures: 0,
                open_until: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn allow(&self) -> std::result::Result<(), GenerationFailure> {
        let mut st = self.lock();
        if let Some(until) = st.open_until {
            let now = Instant::now();
            if now < until {
                return Err(GenerationFailure::CircuitOpen {
                    remaining_ms: (until - now).as_millis() as u64,
                });
            }
            // cooldown expired
            st.open_until = None;
            st.consecutive_failures = 0;
        }
        Ok(())
    }

    pub fn on_success(&self) {
        let mut st = self.lock();
        st.consecutive_failures = 0;
        st.open_until = None;
    }

    pub fn on_failure(&self) {
        let mut st = self.lock();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);
        if st.consecutive_failures >= self.cfg.failure_threshold {
            st.open_until = Some(Instant::now() + self.cfg.cooldown);
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let st = self.lock();
        let open_remaining_ms = st.open_until.and_then(|until| {
            if until > now {
                Some((until - now).as_millis() as u64)
            } else {
                None
            }
        });
        CircuitBreakerSnapshot {
            failure_threshold: self.cfg.failure_threshold,
            cooldown_ms: self.cfg.cooldown.as_millis() as u64,
            consecutive_failures: st.consecutive_failures,
            open_remaining_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_circuit_breaker_threshold_is_at_least_one() {
        let config = CircuitBreakerConfig::new().with_failure_threshold(0);
        assert_eq!(config.failure_threshold, 1);
    }

    #[test]
    fn test_circuit_breaker_initial_state() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert!(cb.allow().is_ok());

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(!snapshot.is_open());
    }

    #[test]
    fn test_circuit_breaker_success_resets_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new().with_failure_threshold(5));

        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.snapshot().consecutive_failures, 2);

        cb.on_success();
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }

    #[test]
    fn test_circuit_breaker_opens_at_threshold() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_cooldown(Duration::from_millis(100));
        let cb = CircuitBreaker::new(config);

        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow().is_ok());

        cb.on_failure();
        assert!(matches!(
            cb.allow(),
            Err(GenerationFailure::CircuitOpen { .. })
        ));
        assert!(cb.snapshot().is_open());
    }

    #[test]
    fn test_circuit_breaker_closes_after_cooldown() {
        let config = CircuitBreakerConfig::new()
            .with_failure_threshold(2)
            .with_cooldown(Duration::from_millis(50));
        let cb = CircuitBreaker::new(config);

        cb.on_failure();
        cb.on_failure();
        assert!(cb.allow().is_err());

        thread::sleep(Duration::from_millis(80));

        assert!(cb.allow().is_ok());
        assert_eq!(cb.snapshot().consecutive_failures, 0);
    }
}
