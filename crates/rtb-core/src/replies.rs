//! User-facing texts.

use crate::{models::Task, Error, Result};

pub const GENERIC_FAILURE: &str = "Something went wrong, please try again later";
pub const EMPTY_URL: &str = "Please provide article url";
pub const TASK_ADDED: &str = "Task added successfully";
pub const NOTHING_IN_PROGRESS: &str = "You don't have any tasks in progress";
pub const NO_TASKS: &str = "There are no tasks available. Please add some tasks first";

pub fn greeting(reminder_note: Option<&str>) -> String {
    let reminder = match reminder_note {
        Some(note) => format!("I will remind you to read your articles from your reading list ({note}).\n"),
        None => String::new(),
    };
    format!(
        "Hello, I'm your reading list bot!\n\
{reminder}\
Use /add <article url> command to add new article to your reading list.\n\
Use /current command to get current article from your reading list.\n\
Use /done command to mark current article as read.\n\
Use /next command to get next article from your reading list.\n\
Use /skip command to put the current article back and get another one."
    )
}

pub fn done(remaining: usize) -> String {
    format!("Tasks marked as done successfully. You got {remaining} task(s) left in backlog")
}

pub fn current(url: &str) -> String {
    format!("Your current task is {url}")
}

pub fn next(url: &str) -> String {
    format!("Your next task is: \n{url}")
}

pub fn unfinished(url: &str) -> String {
    format!("You have unfinished task. Please finish it first. Your current task is \n{url}")
}

/// Render the outcome of picking a next task.
///
/// `NotFinished` and `NotFound` become their notices; any other error is
/// handed back to the caller.
pub fn for_next_task(outcome: Result<Task>) -> Result<String> {
    match outcome {
        Ok(task) => Ok(next(&task.url)),
        Err(Error::NotFinished(task)) => Ok(unfinished(&task.url)),
        Err(e) if e.is_not_found() => Ok(NO_TASKS.to_string()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        domain::{TaskId, UserId},
        models::TaskStatus,
    };

    fn task(url: &str, status: TaskStatus) -> Task {
        Task {
            id: TaskId(1),
            user_id: UserId(1),
            url: url.to_string(),
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn next_task_outcomes_render_to_notices() {
        assert_eq!(
            for_next_task(Ok(task("http://x", TaskStatus::InProgress))).unwrap(),
            "Your next task is: \nhttp://x"
        );
        assert!(
            for_next_task(Err(Error::NotFinished(Box::new(task("http://y", TaskStatus::InProgress)))))
                .unwrap()
                .ends_with("\nhttp://y")
        );
        assert_eq!(
            for_next_task(Err(Error::not_found("Task", "status", "NEW"))).unwrap(),
            NO_TASKS
        );
        assert!(matches!(
            for_next_task(Err(Error::Storage("down".into()))),
            Err(Error::Storage(_))
        ));
    }

    #[test]
    fn greeting_mentions_reminders_only_when_scheduled() {
        assert!(greeting(Some("daily at 17:00 UTC")).contains("daily at 17:00 UTC"));
        assert!(!greeting(None).contains("remind"));
    }
}
