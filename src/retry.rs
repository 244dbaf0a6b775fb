//! Re-sending a request when the server answers with a retryable status.
//!
//! A [`Retry`] pairs the statuses worth another try with a [`RetryStrategy`]
//! that spaces the tries out. Only responses are retried; a transport failure
//! ends the execution at once, and once the strategy runs dry the last
//! response is returned as is.

use http::StatusCode;
use rand::Rng;
use std::time::Duration;

/// How long to wait before each re-send, and how many re-sends to allow.
///
/// The retry number handed to the strategy starts at 1 for the first re-send.
#[derive(Debug, Clone, Default)]
pub enum RetryStrategy {
    /// Keep the first response.
    #[default]
    None,

    /// Double the wait after each re-send, starting from `initial_delay` and
    /// never exceeding `max_delay`. With `jitter`, each wait is scaled to a
    /// random 50-100% of itself.
    ExponentialBackoff {
        /// Wait before the first re-send
        initial_delay: Duration,
        /// Upper bound for any single wait
        max_delay: Duration,
        /// Re-sends allowed after the first attempt
        max_retries: usize,
        /// Randomize each wait
        jitter: bool,
    },

    /// Wait the same `delay` before every re-send.
    Linear {
        /// Wait before each re-send
        delay: Duration,
        /// Re-sends allowed after the first attempt
        max_retries: usize,
    },

    /// Ask a function for the wait before re-send number `n`; `None` stops.
    Custom {
        /// Maps the retry number to a wait
        delay_fn: fn(retry: usize) -> Option<Duration>,
    },
}

impl RetryStrategy {
    /// The wait before re-send number `retry`, or `None` once the strategy is
    /// exhausted.
    pub fn delay_before(&self, retry: usize) -> Option<Duration> {
        match *self {
            RetryStrategy::None => None,
            RetryStrategy::Linear { delay, max_retries } => {
                (retry <= max_retries).then_some(delay)
            }
            RetryStrategy::ExponentialBackoff {
                initial_delay,
                max_delay,
                max_retries,
                jitter,
            } => {
                if retry > max_retries {
                    return None;
                }
                let delay = doubled(initial_delay, retry.saturating_sub(1)).min(max_delay);
                Some(if jitter { jittered(delay) } else { delay })
            }
            RetryStrategy::Custom { delay_fn } => delay_fn(retry),
        }
    }
}

fn doubled(base: Duration, times: usize) -> Duration {
    let factor = u32::try_from(times)
        .ok()
        .and_then(|t| 2u32.checked_pow(t))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(rand::thread_rng().gen_range(0.5..=1.0))
}

/// Which response statuses trigger a re-send, and how re-sends are spaced.
///
/// # Examples
///
/// ```
/// use chainreq::{Retry, RetryStrategy};
/// use http::StatusCode;
/// use std::time::Duration;
///
/// let retry = Retry::new(
///     RetryStrategy::Linear { delay: Duration::from_millis(50), max_retries: 3 },
///     [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE],
/// );
///
/// assert_eq!(retry.delay_after(StatusCode::BAD_GATEWAY, 1), Some(Duration::from_millis(50)));
/// assert_eq!(retry.delay_after(StatusCode::NOT_FOUND, 1), None);
/// assert_eq!(retry.delay_after(StatusCode::BAD_GATEWAY, 4), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Retry {
    strategy: RetryStrategy,
    statuses: Vec<StatusCode>,
}

impl Retry {
    /// Retries `statuses` according to `strategy`.
    pub fn new(strategy: RetryStrategy, statuses: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            strategy,
            statuses: statuses.into_iter().collect(),
        }
    }

    /// Given the status of attempt number `attempt`, returns how long to wait
    /// before sending again, or `None` to keep that response.
    pub fn delay_after(&self, status: StatusCode, attempt: usize) -> Option<Duration> {
        if self.statuses.contains(&status) {
            self.strategy.delay_before(attempt)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUSY: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

    fn on_busy(strategy: RetryStrategy) -> Retry {
        Retry::new(strategy, [BUSY])
    }

    #[test]
    fn test_backoff_doubles_up_to_the_cap() {
        let retry = on_busy(RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
            max_retries: 5,
            jitter: false,
        });

        let waits: Vec<_> = (1..=6).map(|n| retry.delay_after(BUSY, n)).collect();
        assert_eq!(
            waits,
            vec![
                Some(Duration::from_millis(100)),
                Some(Duration::from_millis(200)),
                Some(Duration::from_millis(400)),
                Some(Duration::from_millis(800)),
                Some(Duration::from_secs(1)),
                None,
            ]
        );
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let strategy = RetryStrategy::ExponentialBackoff {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(1),
            max_retries: 1,
            jitter: true,
        };
        for _ in 0..20 {
            let wait = strategy.delay_before(1).unwrap();
            assert!(wait >= Duration::from_millis(100) && wait <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_linear_gives_up_after_max_retries() {
        let retry = on_busy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 1,
        });

        assert_eq!(retry.delay_after(BUSY, 1), Some(Duration::from_millis(10)));
        assert_eq!(retry.delay_after(BUSY, 2), None);
    }

    #[test]
    fn test_custom_strategy() {
        let retry = on_busy(RetryStrategy::Custom {
            delay_fn: |n| (n < 3).then(|| Duration::from_millis(n as u64)),
        });

        assert_eq!(retry.delay_after(BUSY, 2), Some(Duration::from_millis(2)));
        assert_eq!(retry.delay_after(BUSY, 3), None);
    }

    #[test]
    fn test_other_statuses_are_kept() {
        let retry = on_busy(RetryStrategy::Linear {
            delay: Duration::from_millis(10),
            max_retries: 3,
        });
        assert_eq!(retry.delay_after(StatusCode::INTERNAL_SERVER_ERROR, 1), None);
        assert_eq!(Retry::default().delay_after(BUSY, 1), None);
    }
}
