use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPool, Postgres, QueryBuilder};
use tracing::{debug, Span};

use rtb_core::{
    domain::{TaskId, UserId},
    models::{NewTask, Task, TaskStatus},
    ports::TasksStore,
    Error, Result,
};

use crate::storage_err;

const COLUMNS: &str = "id, user_id, url, status, created_at, updated_at";

/// Partial unique index allowing one `IN_PROGRESS` row per user.
const ONE_IN_PROGRESS: &str = "idx_tasks_one_in_progress";

fn update_err(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db) if db.constraint() == Some(ONE_IN_PROGRESS) => {
            Error::Conflict(format!("another task is already in progress: {db}"))
        }
        _ => storage_err(e),
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: i64,
    user_id: i64,
    url: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(r: TaskRow) -> Result<Self> {
        Ok(Task {
            id: TaskId(r.id),
            user_id: UserId(r.user_id),
            url: r.url,
            status: r.status.parse()?,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

pub struct PgTasksStore {
    pool: PgPool,
    span: Span,
}

impl PgTasksStore {
    pub fn new(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }
}

#[async_trait]
impl TasksStore for PgTasksStore {
    async fn insert(&self, task: NewTask) -> Result<Task> {
        let row: TaskRow = sqlx::query_as(&format!(
            "INSERT INTO tasks (user_id, url, status) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        ))
        .bind(task.user_id.0)
        .bind(&task.url)
        .bind(task.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        debug!(parent: &self.span, task_id = row.id, user_id = row.user_id, "inserted task");
        row.try_into()
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Task> {
        sqlx::query_as::<_, TaskRow>(&format!("SELECT {COLUMNS} FROM tasks WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .ok_or_else(|| Error::not_found("Task", "id", id))?
            .try_into()
    }

    async fn get_in_progress_by_user(&self, user_id: UserId) -> Result<Vec<Task>> {
        self.get_by_user_and_status(user_id, TaskStatus::InProgress)
            .await
    }

    async fn get_by_user_and_status(
        &self,
        user_id: UserId,
        status: TaskStatus,
    ) -> Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE user_id = $1 AND status = $2 ORDER BY id"
        ))
        .bind(user_id.0)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        into_tasks(rows)
    }

    async fn get_random_by_user_and_status(
        &self,
        user_id: UserId,
        status: TaskStatus,
    ) -> Result<Task> {
        sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {COLUMNS} FROM tasks WHERE user_id = $1 AND status = $2 ORDER BY random() LIMIT 1"
        ))
        .bind(user_id.0)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| Error::not_found("Task", "status", status))?
        .try_into()
    }

    async fn update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE tasks SET status = ");
        qb.push_bind(status.as_str())
            .push(", updated_at = NOW() WHERE id IN (");
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id.0);
        }
        list.push_unseparated(")");

        let res = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(update_err)?;
        debug!(
            parent: &self.span,
            %status,
            requested = ids.len(),
            updated = res.rows_affected(),
            "updated task status"
        );
        Ok(())
    }
}
