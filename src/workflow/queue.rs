use redis::{aio::ConnectionManager, AsyncCommands, Direction};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    notification::{TaskNotificationInput, TaskNotificationResult, TaskNotificationWorkflow},
    WorkflowError,
};
use crate::config::{redis_url, WorkflowConfig};

const TASK_NOTIFICATION: &str = "task_notification";
const RESULT_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Redis key layout for one namespace / task queue pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    namespace: String,
    pub queue: String,
    pub processing: String,
}

impl QueueKeys {
    pub fn new(namespace: &str, task_queue: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            queue: format!("{namespace}:queue:{task_queue}"),
            processing: format!("{namespace}:processing:{task_queue}"),
        }
    }

    pub fn result(&self, workflow_id: &str) -> String {
        format!("{}:result:{}", self.namespace, workflow_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub workflow_id: String,
    pub workflow_type: String,
    pub input: TaskNotificationInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed { result: TaskNotificationResult },
    Cancelled,
}

/// Starts workflows by pushing jobs onto the durable queue.
#[derive(Clone)]
pub struct WorkflowClient {
    conn: ConnectionManager,
    keys: QueueKeys,
}

impl WorkflowClient {
    /// Connect when a workflow address is configured; `None` otherwise.
    pub async fn connect(config: &WorkflowConfig) -> anyhow::Result<Option<Self>> {
        let Some(address) = config.address.as_deref() else {
            tracing::debug!("workflow address not configured, skipping workflow client");
            return Ok(None);
        };

        let client = redis::Client::open(redis_url(address))?;
        let conn = ConnectionManager::new(client).await?;

        info!(
            address,
            namespace = %config.namespace,
            task_queue = %config.task_queue,
            "workflow client connected"
        );

        Ok(Some(Self {
            conn,
            keys: QueueKeys::new(&config.namespace, &config.task_queue),
        }))
    }

    /// Enqueue a task notification and return its workflow id.
    pub async fn start_task_notification(
        &self,
        input: TaskNotificationInput,
    ) -> Result<String, WorkflowError> {
        let workflow_id = format!("task-notification-{}-{}", input.task_id, Uuid::now_v7());
        let job = Job {
            workflow_id: workflow_id.clone(),
            workflow_type: TASK_NOTIFICATION.to_string(),
            input,
        };
        let payload = serde_json::to_string(&job)?;

        let mut conn = self.conn.clone();
        let _: () = conn.lpush(&self.keys.queue, payload).await?;

        info!(workflow_id = %workflow_id, "task notification workflow enqueued");
        Ok(workflow_id)
    }

    /// Stored outcome of a finished workflow, if any.
    pub async fn outcome(&self, workflow_id: &str) -> Result<Option<JobOutcome>, WorkflowError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.keys.result(workflow_id)).await?;
        Ok(raw.map(|raw| serde_json::from_str(&raw)).transpose()?)
    }
}

/// Queue consumer running task notification workflows.
pub struct Worker {
    client: redis::Client,
    conn: ConnectionManager,
    keys: QueueKeys,
    workflow: Arc<TaskNotificationWorkflow>,
    poll_timeout: Duration,
    execution_timeout: Duration,
}

impl Worker {
    pub async fn connect(
        address: &str,
        config: &WorkflowConfig,
        workflow: TaskNotificationWorkflow,
    ) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url(address))?;
        let conn = ConnectionManager::new(client.clone()).await?;

        Ok(Self {
            client,
            conn,
            keys: QueueKeys::new(&config.namespace, &config.task_queue),
            workflow: Arc::new(workflow),
            poll_timeout: Duration::from_secs(1),
            execution_timeout: Duration::from_secs(5 * 60),
        })
    }

    /// Poll until `shutdown` resolves, then wait for in-flight workflows.
    pub async fn run<S>(self, shutdown: S) -> Result<(), WorkflowError>
    where
        S: Future<Output = ()>,
    {
        let requeued = self.requeue_abandoned().await?;
        if requeued > 0 {
            warn!(requeued, "re-queued jobs left over from a previous worker");
        }

        // Blocking pops get their own connection so acks are never queued behind them
        let blocking = self.client.get_multiplexed_async_connection().await?;
        info!(queue = %self.keys.queue, "worker started");

        let poll = {
            let keys = self.keys.clone();
            let timeout = self.poll_timeout;
            move || {
                let mut conn = blocking.clone();
                let keys = keys.clone();
                async move { next_job(&mut conn, &keys, timeout).await }
            }
        };
        let start = {
            let conn = self.conn.clone();
            let keys = self.keys.clone();
            let workflow = self.workflow.clone();
            let execution_timeout = self.execution_timeout;
            move |raw: String| {
                process(
                    raw,
                    conn.clone(),
                    keys.clone(),
                    workflow.clone(),
                    execution_timeout,
                )
            }
        };

        consume(poll, start, shutdown, self.poll_timeout).await;
        info!("worker stopped");

        Ok(())
    }

    async fn requeue_abandoned(&self) -> Result<usize, WorkflowError> {
        let mut conn = self.conn.clone();
        let mut moved = 0;
        loop {
            let job: Option<String> = conn
                .lmove(
                    &self.keys.processing,
                    &self.keys.queue,
                    Direction::Right,
                    Direction::Right,
                )
                .await?;
            if job.is_none() {
                return Ok(moved);
            }
            moved += 1;
        }
    }
}

/// Atomically move the oldest queued job onto the processing list.
async fn next_job(
    conn: &mut redis::aio::MultiplexedConnection,
    keys: &QueueKeys,
    timeout: Duration,
) -> redis::RedisResult<Option<String>> {
    conn.blmove(
        &keys.queue,
        &keys.processing,
        Direction::Right,
        Direction::Left,
        timeout.as_secs_f64(),
    )
    .await
}

fn log_join(joined: Result<Result<(), WorkflowError>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("workflow job failed: {}", e),
        Err(e) => error!("workflow job panicked: {}", e),
    }
}

/// Feed polled jobs to `start` until `shutdown` resolves, then drain.
///
/// Only shutdown may interrupt a pending poll: a dropped BLMOVE reply would
/// strand its job on the processing list. Finished jobs are reaped between polls.
async fn consume<P, PF, J, JF, S>(mut poll: P, mut start: J, shutdown: S, retry_delay: Duration)
where
    P: FnMut() -> PF,
    PF: Future<Output = redis::RedisResult<Option<String>>>,
    J: FnMut(String) -> JF,
    JF: Future<Output = Result<(), WorkflowError>> + Send + 'static,
    S: Future<Output = ()>,
{
    let mut in_flight = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            next = poll() => match next {
                Ok(Some(raw)) => {
                    in_flight.spawn(start(raw));
                }
                Ok(None) => {}
                Err(e) => {
                    error!("failed to poll workflow queue: {}", e);
                    tokio::time::sleep(retry_delay).await;
                }
            },
        }

        while let Some(joined) = in_flight.try_join_next() {
            log_join(joined);
        }
    }

    info!(in_flight = in_flight.len(), "worker stopping, waiting for in-flight workflows");
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
}

async fn process(
    raw: String,
    mut conn: ConnectionManager,
    keys: QueueKeys,
    workflow: Arc<TaskNotificationWorkflow>,
    execution_timeout: Duration,
) -> Result<(), WorkflowError> {
    match serde_json::from_str::<Job>(&raw) {
        Ok(job) if job.workflow_type == TASK_NOTIFICATION => {
            let outcome = match workflow
                .run_until(&job.input, tokio::time::sleep(execution_timeout))
                .await
            {
                Ok(result) => JobOutcome::Completed { result },
                Err(_) => JobOutcome::Cancelled,
            };

            let _: () = conn
                .set_ex(
                    keys.result(&job.workflow_id),
                    serde_json::to_string(&outcome)?,
                    RESULT_TTL_SECONDS,
                )
                .await?;
        }
        Ok(job) => warn!(workflow_type = %job.workflow_type, "dropping job of unknown type"),
        Err(e) => warn!("dropping malformed job: {}", e),
    }

    // Acknowledge: the job leaves the processing list only after its outcome is stored
    let _: () = conn.lrem(&keys.processing, 1, &raw).await?;
    Ok(())
}
