//! Persistence ports consumed by the core.
//!
//! Implemented by `rtb-postgres` for production and by [`crate::memory`] for
//! tests. Lookups that match nothing return [`crate::Error::NotFound`]; list
//! queries return rows ordered by ascending id.

use async_trait::async_trait;

use crate::{
    domain::{TaskId, UserId},
    models::{NewTask, NewUser, Task, TaskStatus, User},
    Result,
};

#[async_trait]
pub trait UsersStore: Send + Sync {
    /// Persist a user and return the stored row with server-assigned fields.
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn get_by_id(&self, id: UserId) -> Result<User>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<User>;
    async fn list_all(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait TasksStore: Send + Sync {
    /// Persist a task and return the stored row with server-assigned fields.
    async fn insert(&self, task: NewTask) -> Result<Task>;
    async fn get_by_id(&self, id: TaskId) -> Result<Task>;
    async fn get_in_progress_by_user(&self, user_id: UserId) -> Result<Vec<Task>>;
    async fn get_by_user_and_status(&self, user_id: UserId, status: TaskStatus)
        -> Result<Vec<Task>>;
    /// One uniformly random task of the user in `status`, or `NotFound`.
    async fn get_random_by_user_and_status(
        &self,
        user_id: UserId,
        status: TaskStatus,
    ) -> Result<Task>;
    /// Bulk status change. An empty id list is a no-op.
    async fn update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<()>;
}
