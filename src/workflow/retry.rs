use std::{future::Future, time::Duration};
use tracing::warn;

use super::activity::ActivityError;

/// Activity retry policy: exponential backoff with a capped interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    pub maximum_interval: Duration,
    pub maximum_attempts: u32,
    /// Upper bound for a single attempt
    pub start_to_close_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 3,
            start_to_close_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        if !secs.is_finite() || secs >= self.maximum_interval.as_secs_f64() {
            self.maximum_interval
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Run `op` until it succeeds or the attempts are exhausted, returning the last error.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ActivityError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ActivityError>>,
    {
        let attempts = self.maximum_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match tokio::time::timeout(self.start_to_close_timeout, op(attempt)).await
            {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => ActivityError::TimedOut(self.start_to_close_timeout),
            };

            if attempt >= attempts {
                return Err(error);
            }

            let delay = self.backoff(attempt);
            warn!(attempt, ?delay, error = %error, "activity attempt failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::activity::Channel;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    fn failure() -> ActivityError {
        ActivityError::DeliveryFailed {
            channel: Channel::Push,
            task_id: "t".into(),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(7), Duration::from_secs(60));
        assert_eq!(policy.backoff(500), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_maximum_attempts() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .run(|_| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(failure())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 1s + 2s of backoff between the three attempts
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_later_attempt() {
        let policy = RetryPolicy::default();

        let result = policy
            .run(|attempt| async move {
                if attempt < 2 {
                    Err(failure())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let policy = RetryPolicy {
            maximum_attempts: 1,
            ..RetryPolicy::default()
        };

        let result: Result<(), _> = policy
            .run(|_| async {
                tokio::time::sleep(Duration::from_secs(120)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(ActivityError::TimedOut(_))));
    }
}
