//! Task notification workflow: parallel fan-out to three channels with retries,
//! fed by a Redis-backed durable queue.

pub mod activity;
pub mod notification;
pub mod queue;
pub mod retry;

pub use activity::{ActivityError, Channel, MockActivity, NotificationActivity};
pub use notification::{TaskNotificationInput, TaskNotificationResult, TaskNotificationWorkflow};
pub use queue::{JobOutcome, WorkflowClient, Worker};
pub use retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("workflow queue error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to encode workflow payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("workflow cancelled")]
    Cancelled,
}
