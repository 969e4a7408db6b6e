use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use tracing::{debug, Span};

use rtb_core::{
    domain::{ChatId, UserId},
    models::{NewUser, User},
    ports::UsersStore,
    Error, Result,
};

use crate::storage_err;

const COLUMNS: &str = "id, external_id, chat_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    external_id: String,
    chat_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: UserId(r.id),
            external_id: r.external_id,
            chat_id: ChatId(r.chat_id),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub struct PgUsersStore {
    pool: PgPool,
    span: Span,
}

impl PgUsersStore {
    pub fn new(pool: PgPool, span: Span) -> Self {
        Self { pool, span }
    }
}

#[async_trait]
impl UsersStore for PgUsersStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (external_id, chat_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        ))
        .bind(&user.external_id)
        .bind(user.chat_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        debug!(parent: &self.span, user_id = row.id, "inserted user");
        Ok(row.into())
    }

    async fn get_by_id(&self, id: UserId) -> Result<User> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?
            .map(User::from)
            .ok_or_else(|| Error::not_found("User", "id", id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<User> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {COLUMNS} FROM users WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?
        .map(User::from)
        .ok_or_else(|| Error::not_found("User", "external_id", external_id))
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!("SELECT {COLUMNS} FROM users ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}
