//! Retry delays for transient transport failures.
//!
//! [`BackoffConfig`] controls how many times [`with_backoff`](super::with_backoff)
//! re-issues a chat call and how long it waits in between. The pipeline
//! derives its config from [`ChatConfig`](crate::config::ChatConfig) via
//! [`BackoffConfig::from_chat_config`].

use crate::config::ChatConfig;
use std::time::Duration;

/// Configuration for transport-level retry.
///
/// # Example
///
/// ```
/// use llm_regress::backend::BackoffConfig;
///
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// let transient = BackoffConfig::transient(2);
/// assert_eq!(transient.max_retries, 2);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Extra attempts after the first. Default: 0 (no retry).
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Multiplier applied to the delay after each retry.
    pub multiplier: f64,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// No retry at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::transient(0)
        }
    }

    /// Delays of 1.5 s, then 3 s, and so on, capped at 10 s.
    pub fn transient(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(1500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// `max_retry_attempt` counts the first try, so the retry count is one less.
    pub fn from_chat_config(config: &ChatConfig) -> Self {
        Self::transient(config.max_retry_attempt.saturating_sub(1))
    }

    /// Zero-delay retries, for driving the retry loop in tests.
    #[cfg(test)]
    pub(crate) fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry N (0-indexed): `initial_delay * multiplier^attempt`,
    /// capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_delays_grow() {
        let config = BackoffConfig::transient(3);
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1500));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(3000));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(6000));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = BackoffConfig::transient(10);
        assert_eq!(config.delay_for_attempt(8), Duration::from_secs(10));
    }

    #[test]
    fn test_immediate_never_waits() {
        let config = BackoffConfig::immediate(4);
        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn test_from_chat_config_counts_first_attempt() {
        let config = ChatConfig::default().with_max_retry_attempt(3);
        assert_eq!(BackoffConfig::from_chat_config(&config).max_retries, 2);

        let config = ChatConfig::default().with_max_retry_attempt(0);
        assert_eq!(BackoffConfig::from_chat_config(&config).max_retries, 0);
    }

    #[test]
    fn test_none_preset() {
        assert_eq!(BackoffConfig::none().max_retries, 0);
        assert_eq!(BackoffConfig::default().max_retries, 0);
    }
}
