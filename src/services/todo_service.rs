use crate::{
    error::{ApiError, Result},
    services::changes::ChangeSet,
    telemetry::{Operation, Telemetry},
};
use entity::todos;
use sea_orm::{entity::*, query::*, sea_query::Expr, DatabaseConnection};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

const UPDATABLE: &[&str] = &["text"];

pub struct TodoService {
    db: DatabaseConnection,
    telemetry: Arc<dyn Telemetry>,
}

impl TodoService {
    pub fn new(db: DatabaseConnection, telemetry: Arc<dyn Telemetry>) -> Self {
        Self { db, telemetry }
    }

    #[instrument(name = "todo_create", skip_all, fields(operation = "create"))]
    pub async fn create(&self, text: String) -> Result<todos::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "todo_create");
        let now = OffsetDateTime::now_utc();
        let todo = todos::ActiveModel {
            text: Set(text),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        };
        let result = todo.insert(&self.db).await.map_err(ApiError::from);
        op.finish(result)
    }

    #[instrument(name = "todo_get", skip(self), fields(operation = "get", todo.id = id))]
    pub async fn get(&self, id: i64) -> Result<todos::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "todo_get");
        let result = self.find_live(id).await;
        op.finish(result)
    }

    #[instrument(name = "todo_find", skip_all, fields(operation = "find"))]
    pub async fn find(&self) -> Result<Vec<todos::Model>> {
        let op = Operation::start(self.telemetry.as_ref(), "todo_find");
        let result = todos::Entity::find()
            .filter(todos::Column::DeletedAt.is_null())
            .order_by_asc(todos::Column::Id)
            .all(&self.db)
            .await
            .map_err(ApiError::from);
        op.finish(result)
    }

    #[instrument(name = "todo_update", skip(self, changes), fields(operation = "update", todo.id = id))]
    pub async fn update(&self, id: i64, changes: ChangeSet) -> Result<todos::Model> {
        let op = Operation::start(self.telemetry.as_ref(), "todo_update");
        let result = self.apply(id, &changes).await;
        op.finish(result)
    }

    #[instrument(name = "todo_delete", skip(self), fields(operation = "delete", todo.id = id))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        let op = Operation::start(self.telemetry.as_ref(), "todo_delete");
        let now = OffsetDateTime::now_utc();
        let result = todos::Entity::update_many()
            .col_expr(todos::Column::DeletedAt, Expr::value(now))
            .col_expr(todos::Column::UpdatedAt, Expr::value(now))
            .filter(todos::Column::Id.eq(id))
            .filter(todos::Column::DeletedAt.is_null())
            .exec(&self.db)
            .await
            .map_err(ApiError::from)
            .and_then(|outcome| match outcome.rows_affected {
                0 => Err(not_found(id)),
                _ => Ok(()),
            });
        op.finish(result)
    }

    async fn find_live(&self, id: i64) -> Result<todos::Model> {
        todos::Entity::find_by_id(id)
            .filter(todos::Column::DeletedAt.is_null())
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn apply(&self, id: i64, changes: &ChangeSet) -> Result<todos::Model> {
        let columns = changes.resolve::<todos::Column>(UPDATABLE)?;

        let mut update = todos::Entity::update_many()
            .col_expr(
                todos::Column::UpdatedAt,
                Expr::value(OffsetDateTime::now_utc()),
            )
            .filter(todos::Column::Id.eq(id))
            .filter(todos::Column::DeletedAt.is_null());
        for (column, value) in columns {
            update = update.col_expr(column, Expr::value(value));
        }

        if update.exec(&self.db).await?.rows_affected == 0 {
            return Err(not_found(id));
        }
        self.find_live(id).await
    }
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("todo {} not found", id))
}
