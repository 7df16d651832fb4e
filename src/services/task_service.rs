use crate::{
    error::{ApiError, Result},
    middleware::UserIdentity,
    services::changes::ChangeSet,
    telemetry::{Operation, Telemetry},
    workflow::{TaskNotificationInput, WorkflowClient},
};
use entity::tasks;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Columns a PATCH may touch
const UPDATABLE: &[&str] = &["description"];

#[derive(Debug, Clone)]
pub struct NewTask {
    pub description: String,
}

pub struct TaskService {
    db: DatabaseConnection,
    telemetry: Arc<dyn Telemetry>,
    workflow: Option<WorkflowClient>,
}

impl TaskService {
    pub fn new(
        db: DatabaseConnection,
        telemetry: Arc<dyn Telemetry>,
        workflow: Option<WorkflowClient>,
    ) -> Self {
        Self {
            db,
            telemetry,
            workflow,
        }
    }

    /// Create a task owned by `caller`, if any.
    #[instrument(name = "task_create", skip_all, fields(operation = "create", task.id = tracing::field::Empty))]
    pub async fn create(&self, caller: Option<&UserIdentity>, new: NewTask) -> Result<tasks::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "task_create");
        let result = self.insert(caller, new).await;
        let result = op.finish(result);

        if let Ok(task) = &result {
            self.notify(task.id, "create").await;
        }
        result
    }

    /// Fetch a live task, enforcing ownership when a caller is given.
    #[instrument(name = "task_get", skip(self, caller), fields(operation = "get", task.id = %id))]
    pub async fn get(&self, caller: Option<&UserIdentity>, id: Uuid) -> Result<tasks::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "task_get");
        let result = self.find_owned(caller, id).await;
        op.finish(result)
    }

    #[instrument(name = "task_find", skip_all, fields(operation = "find"))]
    pub async fn find(&self) -> Result<Vec<tasks::Model>> {
        let op = Operation::start(self.telemetry.as_ref(), "task_find");
        let result = tasks::Entity::find()
            .filter(tasks::Column::DeletedAt.is_null())
            .order_by_asc(tasks::Column::Id)
            .all(&self.db)
            .await
            .map_err(ApiError::from);
        op.finish(result)
    }

    #[instrument(name = "task_find_by_user", skip(self), fields(operation = "find_by_user"))]
    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<tasks::Model>> {
        let op = Operation::start(self.telemetry.as_ref(), "task_find_by_user");
        let result = tasks::Entity::find()
            .filter(tasks::Column::CreatedBy.eq(user_id))
            .filter(tasks::Column::DeletedAt.is_null())
            .order_by_asc(tasks::Column::Id)
            .all(&self.db)
            .await
            .map_err(ApiError::from);
        op.finish(result)
    }

    /// Apply `changes` to the named columns only, then return the fresh record.
    #[instrument(name = "task_update", skip(self, caller, changes), fields(operation = "update", task.id = %id))]
    pub async fn update(
        &self,
        caller: Option<&UserIdentity>,
        id: Uuid,
        changes: ChangeSet,
    ) -> Result<tasks::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "task_update");
        let result = self.apply(caller, id, &changes).await;
        let result = op.finish(result);

        if result.is_ok() {
            self.notify(id, "update").await;
        }
        result
    }

    /// Soft-delete a task.
    #[instrument(name = "task_delete", skip(self, caller), fields(operation = "delete", task.id = %id))]
    pub async fn delete(&self, caller: Option<&UserIdentity>, id: Uuid) -> Result<()> {
        let op = Operation::start(self.telemetry.as_ref(), "task_delete");
        let result = self.soft_delete(caller, id).await;
        op.finish(result)
    }

    async fn insert(&self, caller: Option<&UserIdentity>, new: NewTask) -> Result<tasks::Model> {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::now_v7();
        tracing::Span::current().record("task.id", tracing::field::display(id));

        let task = tasks::ActiveModel {
            id: Set(id),
            description: Set(new.description),
            created_by: Set(caller.map(|c| c.subject.clone())),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        Ok(task.insert(&self.db).await?)
    }

    async fn find_owned(&self, caller: Option<&UserIdentity>, id: Uuid) -> Result<tasks::Model> {
        let task = tasks::Entity::find_by_id(id)
            .filter(tasks::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("task {} not found", id)))?;

        ensure_owner(caller, &task)?;
        Ok(task)
    }

    async fn apply(
        &self,
        caller: Option<&UserIdentity>,
        id: Uuid,
        changes: &ChangeSet,
    ) -> Result<tasks::Model> {
        let columns = changes.resolve::<tasks::Column>(UPDATABLE)?;

        // Ownership read before the write
        self.find_owned(caller, id).await?;

        let mut update = tasks::Entity::update_many()
            .col_expr(
                tasks::Column::UpdatedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::DeletedAt.is_null());
        for (column, value) in columns {
            update = update.col_expr(column, Expr::value(value));
        }

        let outcome = update.exec(&self.db).await?;
        if outcome.rows_affected == 0 {
            return Err(ApiError::NotFound(format!("task {} not found", id)));
        }

        self.find_owned(caller, id).await
    }

    async fn soft_delete(&self, caller: Option<&UserIdentity>, id: Uuid) -> Result<()> {
        self.find_owned(caller, id).await?;

        let now = OffsetDateTime::now_utc();
        let outcome = tasks::Entity::update_many()
            .col_expr(tasks::Column::DeletedAt, Expr::value(now))
            .col_expr(tasks::Column::UpdatedAt, Expr::value(now))
            .filter(tasks::Column::Id.eq(id))
            .filter(tasks::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await?;

        if outcome.rows_affected == 0 {
            return Err(ApiError::NotFound(format!("task {} not found", id)));
        }
        Ok(())
    }

    /// Best effort: a failed enqueue never fails the request.
    async fn notify(&self, id: Uuid, notification_type: &str) {
        let Some(workflow) = &self.workflow else {
            return;
        };

        let input = TaskNotificationInput::new(id.to_string(), notification_type);
        if let Err(e) = workflow.start_task_notification(input).await {
            warn!(task_id = %id, "failed to start task notification workflow: {}", e);
        }
    }
}

/// Callers may only touch tasks they created; anonymous callers skip the check.
fn ensure_owner(caller: Option<&UserIdentity>, task: &tasks::Model) -> Result<()> {
    match caller {
        Some(identity) if task.created_by.as_deref() != Some(identity.subject.as_str()) => Err(
            ApiError::Forbidden("you do not have access to this task".to_string()),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NoopTelemetry;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn task(id: Uuid, owner: Option<&str>, description: &str) -> tasks::Model {
        let now = OffsetDateTime::now_utc();
        tasks::Model {
            id,
            description: description.to_string(),
            created_by: owner.map(str::to_string),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn caller(subject: &str) -> UserIdentity {
        UserIdentity {
            subject: subject.to_string(),
        }
    }

    fn service(db: DatabaseConnection) -> TaskService {
        TaskService::new(db, Arc::new(NoopTelemetry), None)
    }

    #[tokio::test]
    async fn test_create_assigns_time_ordered_id_and_owner() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(id, Some("alice"), "write docs")]])
            .into_connection();
        let svc = service(db);

        let created = svc
            .create(
                Some(&caller("alice")),
                NewTask {
                    description: "write docs".into(),
                },
            )
            .await
            .unwrap();

        assert_eq!(created.created_by.as_deref(), Some("alice"));
        assert_eq!(created.id.get_version_num(), 7);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tasks::Model>::new()])
            .into_connection();
        let svc = service(db);

        let err = svc.get(None, Uuid::now_v7()).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_get_someone_elses_task_is_forbidden() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(id, Some("alice"), "secret")]])
            .into_connection();
        let svc = service(db);

        let err = svc.get(Some(&caller("mallory")), id).await.unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }

    #[tokio::test]
    async fn test_delete_someone_elses_task_is_forbidden_and_writes_nothing() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(id, Some("alice"), "secret")]])
            .into_connection();
        let svc = service(db.clone());

        let err = svc.delete(Some(&caller("mallory")), id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        // Only the ownership read reached the database
        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn test_update_someone_elses_task_is_forbidden_and_writes_nothing() {
        let id = Uuid::now_v7();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(id, Some("alice"), "secret")]])
            .into_connection();
        let svc = service(db.clone());

        let mut changes = ChangeSet::new();
        changes.set("description", "hijacked".to_string());
        let err = svc
            .update(Some(&caller("mallory")), id, changes)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        assert!(log[0].statements()[0].sql.starts_with("SELECT"));
    }

    #[tokio::test]
    async fn test_partial_update_only_writes_named_columns() {
        let id = Uuid::now_v7();
        let before = task(id, Some("alice"), "old");
        let after = task(id, Some("alice"), "x");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![before]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![after]])
            .into_connection();
        let svc = service(db.clone());

        let mut changes = ChangeSet::new();
        changes.set("description", "x".to_string());
        let updated = svc
            .update(Some(&caller("alice")), id, changes)
            .await
            .unwrap();

        assert_eq!(updated.description, "x");
        assert_eq!(updated.created_by.as_deref(), Some("alice"));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 3);
        let update_sql = &log[1].statements()[0].sql;
        assert!(update_sql.contains("UPDATE \"tasks\" SET"));
        assert!(update_sql.contains("\"description\""));
        assert!(update_sql.contains("\"updated_at\""));
        assert!(!update_sql.contains("\"created_by\" ="));
        assert!(!update_sql.contains("\"created_at\" ="));
    }

    #[tokio::test]
    async fn test_update_missing_task_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<tasks::Model>::new()])
            .into_connection();
        let svc = service(db);

        let mut changes = ChangeSet::new();
        changes.set("description", "x".to_string());
        let err = svc.update(None, Uuid::now_v7(), changes).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn test_find_by_user_filters_on_owner() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![task(Uuid::now_v7(), Some("alice"), "a")]])
            .into_connection();
        let svc = service(db.clone());

        let tasks = svc.find_by_user("alice").await.unwrap();
        assert_eq!(tasks.len(), 1);

        let log = db.into_transaction_log();
        let sql = &log[0].statements()[0].sql;
        assert!(sql.contains(r#""tasks"."created_by" = $1"#));
        assert!(sql.contains(r#""tasks"."deleted_at" IS NULL"#));
    }
}
