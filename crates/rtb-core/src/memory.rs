//! In-process implementation of the persistence ports.

use async_trait::async_trait;
use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::{
    domain::{TaskId, UserId},
    models::{NewTask, NewUser, Task, TaskStatus, User},
    ports::{TasksStore, UsersStore},
    Error, Result,
};

/// Users and tasks kept in memory, with sequential ids starting at 1.
///
/// Mirrors the relational adapter's observable behavior: `external_id` is
/// unique, a user has at most one `IN_PROGRESS` task, lists come back ordered
/// by id, and misses are `NotFound`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    tasks: Vec<Task>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite statuses without the one-in-progress check, to seed rows a
    /// store without that constraint could hold.
    #[cfg(test)]
    pub(crate) async fn force_status(&self, ids: &[TaskId], status: TaskStatus) {
        let mut t = self.inner.lock().await;
        for task in t.tasks.iter_mut().filter(|task| ids.contains(&task.id)) {
            task.status = status;
        }
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut t = self.inner.lock().await;
        if t.users.iter().any(|u| u.external_id == user.external_id) {
            return Err(Error::Storage(format!(
                "duplicate external_id {}",
                user.external_id
            )));
        }
        let now = Utc::now();
        let row = User {
            id: UserId(t.users.len() as i64 + 1),
            external_id: user.external_id,
            chat_id: user.chat_id,
            created_at: now,
            updated_at: now,
        };
        t.users.push(row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: UserId) -> Result<User> {
        let t = self.inner.lock().await;
        t.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("User", "id", id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<User> {
        let t = self.inner.lock().await;
        t.users
            .iter()
            .find(|u| u.external_id == external_id)
            .cloned()
            .ok_or_else(|| Error::not_found("User", "external_id", external_id))
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.inner.lock().await.users.clone())
    }
}

#[async_trait]
impl TasksStore for MemoryStore {
    async fn insert(&self, task: NewTask) -> Result<Task> {
        let mut t = self.inner.lock().await;
        if !t.users.iter().any(|u| u.id == task.user_id) {
            return Err(Error::Storage(format!(
                "task references unknown user {}",
                task.user_id
            )));
        }
        let now = Utc::now();
        let row = Task {
            id: TaskId(t.tasks.len() as i64 + 1),
            user_id: task.user_id,
            url: task.url,
            status: task.status,
            created_at: now,
            updated_at: now,
        };
        t.tasks.push(row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: TaskId) -> Result<Task> {
        let t = self.inner.lock().await;
        t.tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("Task", "id", id))
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
        let t = self.inner.lock().await;
        Ok(t.tasks
            .iter()
            .filter(|task| task.user_id == user_id && task.status == status)
            .cloned()
            .collect())
    }

    async fn get_random_by_user_and_status(
        &self,
        user_id: UserId,
        status: TaskStatus,
    ) -> Result<Task> {
        let candidates = self.get_by_user_and_status(user_id, status).await?;
        candidates
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| Error::not_found("Task", "status", status))
    }

    async fn update_status(&self, ids: &[TaskId], status: TaskStatus) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut t = self.inner.lock().await;
        if status == TaskStatus::InProgress {
            let mut owners: Vec<UserId> = t
                .tasks
                .iter()
                .filter(|task| task.status == TaskStatus::InProgress || ids.contains(&task.id))
                .map(|task| task.user_id)
                .collect();
            owners.sort();
            if let Some(w) = owners.windows(2).find(|w| w[0] == w[1]) {
                return Err(Error::Conflict(format!(
                    "user {} already has a task in progress",
                    w[0]
                )));
            }
        }
        let now = Utc::now();
        for task in t.tasks.iter_mut().filter(|task| ids.contains(&task.id)) {
            task.status = status;
            task.updated_at = now;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChatId;

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = UsersStore::insert(
            &store,
            NewUser {
                external_id: "100".to_string(),
                chat_id: ChatId(100),
            },
        )
        .await
        .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn external_id_is_unique() {
        let (store, _) = seeded().await;
        let dup = UsersStore::insert(
            &store,
            NewUser {
                external_id: "100".to_string(),
                chat_id: ChatId(7),
            },
        )
        .await;
        assert!(matches!(dup, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn lookups_miss_with_not_found() {
        let (store, user) = seeded().await;
        assert!(store
            .get_by_external_id("missing")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(TasksStore::get_by_id(&store, TaskId(9))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .get_random_by_user_and_status(user.id, TaskStatus::New)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn update_status_touches_only_listed_rows() {
        let (store, user) = seeded().await;
        let mut ids = Vec::new();
        for url in ["a", "b", "c"] {
            let task = TasksStore::insert(
                &store,
                NewTask {
                    user_id: user.id,
                    url: url.to_string(),
                    status: TaskStatus::New,
                },
            )
            .await
            .unwrap();
            ids.push(task.id);
        }

        store
            .update_status(&ids[..2], TaskStatus::Done)
            .await
            .unwrap();
        store.update_status(&[], TaskStatus::New).await.unwrap();

        let done = store
            .get_by_user_and_status(user.id, TaskStatus::Done)
            .await
            .unwrap();
        assert_eq!(done.iter().map(|t| t.id).collect::<Vec<_>>(), ids[..2]);
        let third = TasksStore::get_by_id(&store, ids[2]).await.unwrap();
        assert_eq!(third.status, TaskStatus::New);
    }

    #[tokio::test]
    async fn second_in_progress_task_is_a_conflict() {
        let (store, user) = seeded().await;
        let mut ids = Vec::new();
        for url in ["a", "b"] {
            let task = TasksStore::insert(
                &store,
                NewTask {
                    user_id: user.id,
                    url: url.to_string(),
                    status: TaskStatus::New,
                },
            )
            .await
            .unwrap();
            ids.push(task.id);
        }

        store
            .update_status(&ids[..1], TaskStatus::InProgress)
            .await
            .unwrap();
        // Re-marking the same task is fine; promoting another one is not.
        store
            .update_status(&ids[..1], TaskStatus::InProgress)
            .await
            .unwrap();
        let err = store
            .update_status(&ids[1..], TaskStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        let second = TasksStore::get_by_id(&store, ids[1]).await.unwrap();
        assert_eq!(second.status, TaskStatus::New);
    }
}
