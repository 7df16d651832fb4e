use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc};
use tracing::{info, instrument, warn};

use super::{
    activity::{ActivityError, Channel, MockActivity, NotificationActivity},
    retry::RetryPolicy,
    WorkflowError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotificationInput {
    pub task_id: String,
    /// `create` or `update`
    pub notification_type: String,
}

impl TaskNotificationInput {
    pub fn new(task_id: impl Into<String>, notification_type: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            notification_type: notification_type.into(),
        }
    }
}

/// Per-channel outcome of one workflow run. Failures are data, not errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotificationResult {
    pub email_sent: bool,
    pub sms_sent: bool,
    pub push_sent: bool,
    pub errors: Vec<String>,
}

/// Fans a task notification out to email, SMS and push in parallel.
pub struct TaskNotificationWorkflow {
    email: Arc<dyn NotificationActivity>,
    sms: Arc<dyn NotificationActivity>,
    push: Arc<dyn NotificationActivity>,
    retry: RetryPolicy,
}

impl TaskNotificationWorkflow {
    pub fn new(
        email: Arc<dyn NotificationActivity>,
        sms: Arc<dyn NotificationActivity>,
        push: Arc<dyn NotificationActivity>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            email,
            sms,
            push,
            retry,
        }
    }

    pub fn with_mock_activities() -> Self {
        Self::new(
            Arc::new(MockActivity::email()),
            Arc::new(MockActivity::sms()),
            Arc::new(MockActivity::push()),
            RetryPolicy::default(),
        )
    }

    /// Dispatch all three channels concurrently and wait for every outcome.
    #[instrument(name = "task_notification", skip_all, fields(task.id = %input.task_id))]
    pub async fn run(&self, input: &TaskNotificationInput) -> TaskNotificationResult {
        info!(notification_type = %input.notification_type, "starting task notification workflow");

        let (email, sms, push) = tokio::join!(
            self.dispatch(self.email.as_ref(), input),
            self.dispatch(self.sms.as_ref(), input),
            self.dispatch(self.push.as_ref(), input),
        );

        let mut errors = Vec::new();
        let result = TaskNotificationResult {
            email_sent: record(&mut errors, self.email.channel(), email),
            sms_sent: record(&mut errors, self.sms.channel(), sms),
            push_sent: record(&mut errors, self.push.channel(), push),
            errors,
        };

        info!(
            email_sent = result.email_sent,
            sms_sent = result.sms_sent,
            push_sent = result.push_sent,
            failures = result.errors.len(),
            "task notification workflow completed"
        );
        result
    }

    /// Like [`run`](Self::run), but abandons pending dispatches once `cancel` resolves.
    pub async fn run_until<C>(
        &self,
        input: &TaskNotificationInput,
        cancel: C,
    ) -> Result<TaskNotificationResult, WorkflowError>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            result = self.run(input) => Ok(result),
            _ = cancel => {
                warn!(task_id = %input.task_id, "task notification workflow cancelled");
                Err(WorkflowError::Cancelled)
            }
        }
    }

    async fn dispatch(
        &self,
        activity: &dyn NotificationActivity,
        input: &TaskNotificationInput,
    ) -> Result<(), ActivityError> {
        self.retry.run(|_| activity.send(input)).await
    }
}

fn record(errors: &mut Vec<String>, channel: Channel, outcome: Result<(), ActivityError>) -> bool {
    match outcome {
        Ok(()) => true,
        Err(e) => {
            errors.push(format!("{channel}: {e}"));
            false
        }
    }
}
