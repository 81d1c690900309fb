//! Classified retry loop with randomized exponential backoff

use std::time::Duration;

use log::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Longest single backoff sleep
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// What to do with the outcome of one attempt
#[derive(Debug)]
pub enum Attempt<T> {
    /// The call succeeded
    Done(T),
    /// The entity does not exist; skip it
    Absent,
    /// Transient failure; try again after a backoff
    Retry(Error),
    /// Permanent failure
    Fail(Error),
}

impl<T> Attempt<T> {
    /// Sort a service result into the retry classes
    pub fn classify(result: Result<T>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(e) if e.is_not_found() => Attempt::Absent,
            Err(e) if e.is_retryable() => Attempt::Retry(e),
            Err(e) => Attempt::Fail(e),
        }
    }
}

/// How many times and how long to wait before retrying a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.backoff_base(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `uniform(0,1) * 2^retry * base`
    ///
    /// Never longer than [`MAX_DELAY`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = rand::random::<f64>() * 2f64.powi(retry.min(30) as i32);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// Run `op` until it succeeds, reports absence, fails permanently or
    /// runs out of retries
    ///
    /// Returns `Ok(None)` when the entity does not exist.
    pub fn run<T, F>(&self, what: &str, mut op: F) -> Result<Option<T>>
    where
        F: FnMut() -> Result<T>,
    {
        let mut retry = 0;
        loop {
            match Attempt::classify(op()) {
                Attempt::Done(value) => return Ok(Some(value)),
                Attempt::Absent => {
                    debug!("{} not found, skipping", what);
                    return Ok(None);
                }
                Attempt::Fail(e) => return Err(e),
                Attempt::Retry(e) if retry >= self.max_retries => {
                    warn!("Giving up on {} after {} attempts: {}", what, retry + 1, e);
                    return Err(Error::RetriesExhausted {
                        attempts: retry + 1,
                        last: Box::new(e),
                    });
                }
                Attempt::Retry(e) => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    debug!(
                        "Retrying {} in {:?} (retry {}/{}): {}",
                        what, delay, retry, self.max_retries, e
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mut calls = 0;
        let result = instant(3).run("m1", || {
            calls += 1;
            match calls {
                1 => Err(Error::RateLimited("quota".into())),
                2 => Err(Error::Network("reset".into())),
                _ => Ok("body"),
            }
        });
        assert_eq!(result.unwrap(), Some("body"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_not_found_is_skipped() {
        let result: Result<Option<()>> =
            instant(3).run("m1", || Err(Error::NotFound("m1".into())));
        assert_eq!(result.unwrap(), None);
    }

    #[test]
    fn test_permanent_error_is_not_retried() {
        let mut calls = 0;
        let result: Result<Option<()>> = instant(5).run("m1", || {
            calls += 1;
            Err(Error::Auth("revoked".into()))
        });
        assert!(matches!(result, Err(Error::Auth(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_budget_exhaustion() {
        let mut calls = 0;
        let result: Result<Option<()>> = instant(2).run("m1", || {
            calls += 1;
            Err(Error::RateLimited("quota".into()))
        });
        match result {
            Err(Error::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, Error::RateLimited(_)));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_delay_stays_within_exponential_bound() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(10),
        };
        for retry in 1..=10 {
            let bound = Duration::from_millis(10 * 2u64.pow(retry));
            assert!(policy.delay_for(retry) <= bound);
        }
        assert_eq!(instant(1).delay_for(4), Duration::ZERO);
    }

    #[test]
    fn test_huge_base_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 30,
            base_delay: Duration::from_millis(u64::MAX),
        };
        for retry in [1, 10, 30] {
            assert!(policy.delay_for(retry) <= MAX_DELAY);
        }
    }
}
