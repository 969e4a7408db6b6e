//! Reading-list lifecycle: who the user is, what they read next, what is done.
//!
//! At most one task per user is `IN_PROGRESS`. The stores expose no
//! transactions, so every read-modify-write below runs under a per-user async
//! mutex; the update loop and the reminder scheduler share one [`Backlog`].
//! Across processes the store itself refuses a second in-progress task with
//! `Error::Conflict`, which surfaces here as `NotFinished`.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn, Instrument, Span};

use crate::{
    domain::{ChatId, TaskId, UserId},
    models::{NewTask, NewUser, Task, TaskStatus, User},
    ports::{TasksStore, UsersStore},
    Error, Result,
};

/// Result of closing out the in-progress task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    NothingInProgress,
    Completed {
        /// Rows moved to `DONE` (normally one).
        closed: usize,
        /// `NEW` tasks left in the backlog.
        remaining: usize,
    },
}

/// Per-user mutexes. Entries nobody holds or waits on are dropped on the
/// next lock, so the map only tracks users with commands in flight.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.inner.lock().await.len()
    }
}

pub struct Backlog {
    users: Arc<dyn UsersStore>,
    tasks: Arc<dyn TasksStore>,
    locks: UserLocks,
    // Serialises the lookup-miss -> insert path of `ensure_user_exists`.
    creating: Mutex<()>,
    span: Span,
}

impl Backlog {
    pub fn new(users: Arc<dyn UsersStore>, tasks: Arc<dyn TasksStore>, span: Span) -> Self {
        Self {
            users,
            tasks,
            locks: UserLocks::default(),
            creating: Mutex::new(()),
            span,
        }
    }

    /// Find the user by external id, creating it with `chat_id` on first contact.
    pub async fn ensure_user_exists(&self, external_id: &str, chat_id: ChatId) -> Result<User> {
        async {
            match self.users.get_by_external_id(external_id).await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(error = %e, "could not look up user");
                    return Err(e);
                }
            }

            let _guard = self.creating.lock().await;
            // Another command may have created the user while we waited.
            match self.users.get_by_external_id(external_id).await {
                Ok(user) => return Ok(user),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            let user = self
                .users
                .insert(NewUser {
                    external_id: external_id.to_string(),
                    chat_id,
                })
                .await
                .inspect_err(|e| warn!(error = %e, "could not insert user"))?;
            info!(user_id = %user.id, %chat_id, "registered new user");
            Ok(user)
        }
        .instrument(tracing::debug_span!(parent: &self.span, "ensure_user", external_id))
        .await
    }

    /// Add `raw_url` to the backlog as a `NEW` task.
    pub async fn add_task(&self, user: &User, raw_url: &str) -> Result<Task> {
        let url = raw_url.trim();
        if url.is_empty() {
            return Err(Error::Validation("empty url".to_string()));
        }

        let task = self
            .tasks
            .insert(NewTask {
                user_id: user.id,
                url: url.to_string(),
                status: TaskStatus::New,
            })
            .instrument(tracing::debug_span!(parent: &self.span, "add_task", user_id = %user.id))
            .await
            .inspect_err(|e| warn!(parent: &self.span, user_id = %user.id, error = %e, "could not insert task"))?;
        debug!(parent: &self.span, user_id = %user.id, task_id = %task.id, "task added");
        Ok(task)
    }

    /// The task currently presented to the user, if any (lowest id wins).
    pub async fn current_task(&self, user: &User) -> Result<Option<Task>> {
        let in_progress = self.tasks.get_in_progress_by_user(user.id).await?;
        Ok(in_progress.into_iter().min_by_key(|t| t.id))
    }

    /// Promote a random `NEW` task to `IN_PROGRESS`.
    ///
    /// Fails with `NotFinished` while another task is in progress and with
    /// `NotFound` when the backlog is empty.
    pub async fn next_task(&self, user: &User) -> Result<Task> {
        let _guard = self.locks.lock_user(user.id).await;
        self.next_task_locked(user)
            .instrument(tracing::debug_span!(parent: &self.span, "next_task", user_id = %user.id))
            .await
    }

    /// Put the in-progress task(s) back into the backlog and pick again.
    ///
    /// The pick may land on the task that was just skipped.
    pub async fn skip(&self, user: &User) -> Result<Task> {
        let _guard = self.locks.lock_user(user.id).await;
        async {
            let in_progress = self.tasks.get_in_progress_by_user(user.id).await?;
            let ids = task_ids(&in_progress);
            self.tasks.update_status(&ids, TaskStatus::New).await?;
            debug!(reverted = ids.len(), "reverted in-progress tasks");
            self.next_task_locked(user).await
        }
        .instrument(tracing::debug_span!(parent: &self.span, "skip", user_id = %user.id))
        .await
    }

    /// Mark every in-progress task as `DONE` and report what is left.
    pub async fn complete_in_progress(&self, user: &User) -> Result<Completion> {
        let _guard = self.locks.lock_user(user.id).await;
        async {
            let in_progress = self.tasks.get_in_progress_by_user(user.id).await?;
            if in_progress.is_empty() {
                return Ok(Completion::NothingInProgress);
            }
            if in_progress.len() > 1 {
                warn!(count = in_progress.len(), "more than one task was in progress");
            }

            let ids = task_ids(&in_progress);
            self.tasks.update_status(&ids, TaskStatus::Done).await?;
            let remaining = self
                .tasks
                .get_by_user_and_status(user.id, TaskStatus::New)
                .await?
                .len();
            info!(closed = ids.len(), remaining, "tasks marked as done");
            Ok(Completion::Completed {
                closed: ids.len(),
                remaining,
            })
        }
        .instrument(tracing::debug_span!(parent: &self.span, "complete", user_id = %user.id))
        .await
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.users.list_all().await
    }

    async fn next_task_locked(&self, user: &User) -> Result<Task> {
        let in_progress = self.tasks.get_in_progress_by_user(user.id).await?;
        if let Some(blocking) = in_progress.into_iter().min_by_key(|t| t.id) {
            return Err(Error::NotFinished(Box::new(blocking)));
        }

        let mut task = self
            .tasks
            .get_random_by_user_and_status(user.id, TaskStatus::New)
            .await?;
        match self
            .tasks
            .update_status(&[task.id], TaskStatus::InProgress)
            .await
        {
            Ok(()) => {}
            // Another process promoted a task between our read and write.
            Err(Error::Conflict(reason)) => {
                warn!(%reason, "lost promotion race");
                let in_progress = self.tasks.get_in_progress_by_user(user.id).await?;
                return Err(match in_progress.into_iter().min_by_key(|t| t.id) {
                    Some(winner) => Error::NotFinished(Box::new(winner)),
                    None => Error::Conflict(reason),
                });
            }
            Err(e) => return Err(e),
        }
        task.status = TaskStatus::InProgress;
        debug!(task_id = %task.id, "task promoted to in progress");
        Ok(task)
    }
}

fn task_ids(tasks: &[Task]) -> Vec<TaskId> {
    tasks.iter().map(|t| t.id).collect()
}
