//! Poll backoff: how long an idle worker waits before looking again.

use std::time::Duration;

use crate::config::PollConfig;

/// Exponential backoff for idle polling.
///
/// delay = base_delay * multiplier^(idle_polls - 1), capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl PollBackoff {
    pub fn from_config(config: &PollConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            multiplier: config.multiplier,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay after `idle_polls` consecutive empty polls (1-indexed).
    pub fn next_delay(&self, idle_polls: u32) -> Duration {
        let exponent = idle_polls.saturating_sub(1).min(64) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_has_reasonable_values() {
        let backoff = PollBackoff::default();
        assert_eq!(backoff.base_delay, Duration::from_millis(50));
        assert_eq!(backoff.multiplier, 2.0);
        assert_eq!(backoff.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn exponential_backoff_increases_then_caps() {
        let backoff = PollBackoff::default();

        assert_eq!(backoff.next_delay(0), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(1), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(2), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(3), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(6), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(u32::MAX), Duration::from_secs(1));
    }
}
