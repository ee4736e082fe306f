//! 弹性模块：为外部生成器提供熔断保护，失败过多时直接进入降级模式。
//!
//! # Resilience Module
//!
//! Degraded mode, made explicit. When the external generator keeps failing there is
//! no point in waiting for every request to time out: the circuit breaker opens and
//! the cache serves fallback artifacts immediately until the cooldown expires.
//!
//! - **Closed**: misses call the generator
//! - **Open**: misses go straight to the fallback generator
//! - After the cooldown the next miss probes the generator again
//!
//! ```rust
//! use gencache::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(3)
//!     .with_cooldown(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new(config);
//!
//! if breaker.allow().is_ok() {
//!     // call the generator...
//!     breaker.on_success();
//! }
//! ```

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot};
