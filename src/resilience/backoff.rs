//! Watch reconnect backoff.

use rand::Rng;
use std::time::Duration;

use crate::config::WatchConfig;

/// Delay before the next watch attempt after `failures` consecutive failures.
///
/// `base_delay_ms` doubles per failure up to `max_delay_ms`, plus up to 10%
/// jitter. No failures means no delay.
pub fn watch_backoff(failures: u32, config: &WatchConfig) -> Duration {
    let Some(doublings) = failures.checked_sub(1) else {
        return Duration::ZERO;
    };

    let delay_ms = 1u64
        .checked_shl(doublings)
        .and_then(|factor| config.base_delay_ms.checked_mul(factor))
        .map_or(config.max_delay_ms, |ms| ms.min(config.max_delay_ms));

    let jitter_ms = rand::thread_rng().gen_range(0..=delay_ms / 10);
    Duration::from_millis(delay_ms + jitter_ms)
}
