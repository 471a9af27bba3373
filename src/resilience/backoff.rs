//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay to sleep before retrying after `attempt` failed attempts.
///
/// The base delay doubles per attempt and is capped at `max`, then up to
/// 10% jitter is added so synchronized clients spread out.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;
    let exponent = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponent).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(2000);

        let d1 = backoff_delay(1, base, max);
        assert!(d1 >= Duration::from_millis(100) && d1 <= Duration::from_millis(110));

        let d2 = backoff_delay(2, base, max);
        assert!(d2 >= Duration::from_millis(200) && d2 <= Duration::from_millis(220));

        let d3 = backoff_delay(3, base, max);
        assert!(d3 >= Duration::from_millis(400) && d3 <= Duration::from_millis(440));
    }

    #[test]
    fn caps_at_max() {
        let d = backoff_delay(12, Duration::from_millis(100), Duration::from_millis(1000));
        assert!(d >= Duration::from_millis(1000) && d <= Duration::from_millis(1100));
    }

    #[test]
    fn zero_attempts_means_no_delay() {
        assert_eq!(
            backoff_delay(0, Duration::from_millis(100), Duration::from_secs(2)),
            Duration::ZERO
        );
    }
}
