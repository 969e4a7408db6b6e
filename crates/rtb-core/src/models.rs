//! Persisted entities: users and their reading-list tasks.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatId, TaskId, UserId},
    Error,
};

/// A chat participant, created lazily on the first command they send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// The messenger's stable identifier for the participant.
    pub external_id: String,
    /// Where reminders and replies for this user are delivered.
    pub chat_id: ChatId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub external_id: String,
    pub chat_id: ChatId,
}

/// Task lifecycle.
///
/// ```text
/// NEW -> IN_PROGRESS   (picked as next)
/// IN_PROGRESS -> DONE  (/done)
/// IN_PROGRESS -> NEW   (/skip)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    New,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "NEW",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TaskStatus::New),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "DONE" => Ok(TaskStatus::Done),
            other => Err(Error::Storage(format!("unknown task status: {other}"))),
        }
    }
}

/// One reading-list item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub url: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: UserId,
    pub url: String,
    pub status: TaskStatus,
}
