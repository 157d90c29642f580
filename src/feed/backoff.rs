//! Reconnect backoff.

use crate::config::FeederConfig;
use rand::Rng;
use std::time::Duration;

/// Doubling steps before the delay stops growing.
const MAX_DOUBLINGS: u32 = 6;

/// Bounded exponential backoff with up to 25% added jitter.
#[derive(Clone, Debug)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base_ms: base.as_millis() as u64,
            max_ms: max.as_millis() as u64,
            attempt: 0,
        }
    }

    pub fn from_config(config: &FeederConfig) -> Self {
        Self::new(
            Duration::from_millis(config.backoff_base_ms),
            Duration::from_millis(config.backoff_max_ms),
        )
    }

    /// Failed attempts since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, without jitter.
    pub fn nominal_delay(&self) -> Duration {
        let factor = 1u64 << self.attempt.min(MAX_DOUBLINGS);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }

    /// Delay before the next attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let nominal = self.nominal_delay();
        self.attempt = self.attempt.saturating_add(1);

        let spread = nominal.as_millis() as u64 / 4;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        (nominal + Duration::from_millis(jitter)).min(Duration::from_millis(self.max_ms))
    }

    /// Called after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_until_max() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(30));
        let nominal: Vec<u64> = (0..8)
            .map(|_| {
                let d = backoff.nominal_delay().as_millis() as u64;
                backoff.next_delay();
                d
            })
            .collect();
        assert_eq!(nominal, vec![500, 1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(400), Duration::from_secs(30));
        for _ in 0..50 {
            backoff.reset();
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_backoff_reset() {
        let mut backoff = Backoff::from_config(&FeederConfig::default());
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.nominal_delay(), Duration::from_millis(500));
    }
}
