use async_trait::async_trait;
use rand::Rng;
use std::{fmt, time::Duration};
use tracing::info;

use super::notification::TaskNotificationInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
    Push,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActivityError {
    #[error("failed to send {channel} notification for task {task_id}")]
    DeliveryFailed { channel: Channel, task_id: String },

    #[error("attempt timed out after {0:?}")]
    TimedOut(Duration),
}

/// One notification channel. Implementations must be safe to retry.
#[async_trait]
pub trait NotificationActivity: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, input: &TaskNotificationInput) -> Result<(), ActivityError>;
}

/// Stand-in delivery that sleeps for a random latency and fails some of the time.
#[derive(Debug, Clone)]
pub struct MockActivity {
    channel: Channel,
    failure_rate: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl MockActivity {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            failure_rate: 0.1,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(600),
        }
    }

    pub fn email() -> Self {
        Self::new(Channel::Email)
    }

    pub fn sms() -> Self {
        Self::new(Channel::Sms)
    }

    pub fn push() -> Self {
        Self::new(Channel::Push)
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max.max(min);
        self
    }
}

#[async_trait]
impl NotificationActivity for MockActivity {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, input: &TaskNotificationInput) -> Result<(), ActivityError> {
        info!(
            channel = %self.channel,
            task_id = %input.task_id,
            notification_type = %input.notification_type,
            "sending notification"
        );

        // ThreadRng is not Send; draw everything before the await
        let (delay, fail) = {
            let mut rng = rand::rng();
            let millis = rng.random_range(
                self.min_delay.as_millis() as u64..=self.max_delay.as_millis() as u64,
            );
            (
                Duration::from_millis(millis),
                rng.random_bool(self.failure_rate),
            )
        };
        tokio::time::sleep(delay).await;

        if fail {
            return Err(ActivityError::DeliveryFailed {
                channel: self.channel,
                task_id: input.task_id.clone(),
            });
        }

        info!(channel = %self.channel, task_id = %input.task_id, "notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> TaskNotificationInput {
        TaskNotificationInput::new("0192f5a0-0000-7000-8000-000000000001", "create")
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_never_fails_at_zero_rate() {
        let activity = MockActivity::email().with_failure_rate(0.0);
        for _ in 0..20 {
            assert!(activity.send(&input()).await.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_always_fails_at_full_rate() {
        let activity = MockActivity::sms().with_failure_rate(1.0);
        let err = activity.send(&input()).await.unwrap_err();
        assert!(err.to_string().contains("sms"));
    }
}
