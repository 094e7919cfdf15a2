//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Maximum jitter as a fraction of the computed delay (±25%).
pub const JITTER_FACTOR: f64 = 0.25;

/// Delay to wait after `attempt` (1-based) failed, jitter included.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let delay = exponential_delay(config, attempt);
    if config.jitter {
        apply_jitter(delay, rand::thread_rng().gen_range(-1.0..=1.0))
    } else {
        delay
    }
}

/// `min(base_delay × multiplier^(attempt-1), max_delay)` without jitter.
pub fn exponential_delay(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = config.base_delay.as_secs_f64() * 1000.0;
    let max_ms = config.max_delay.as_secs_f64() * 1000.0;
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let delay_ms = base_ms * config.backoff_multiplier.powi(exponent);

    let capped_ms = if delay_ms.is_finite() {
        delay_ms.min(max_ms)
    } else {
        max_ms
    };
    Duration::try_from_secs_f64(capped_ms.max(0.0) / 1000.0).unwrap_or(config.max_delay)
}

/// Shift `delay` by `unit × JITTER_FACTOR × delay`, where `unit` is in
/// `[-1.0, 1.0]`. The result never goes below zero and saturates at
/// `Duration::MAX`.
pub fn apply_jitter(delay: Duration, unit: f64) -> Duration {
    let delay_ms = delay.as_secs_f64() * 1000.0;
    let offset_ms = delay_ms * JITTER_FACTOR * unit.clamp(-1.0, 1.0);
    Duration::try_from_secs_f64((delay_ms + offset_ms).max(0.0) / 1000.0).unwrap_or(Duration::MAX)
}
