//! Proactive "read this next" notifications for every known user.

use std::sync::Arc;

use tracing::{info, warn, Instrument, Span};

use crate::{backlog::Backlog, messaging::port::MessagingPort, models::User, replies, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub users: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct ReminderBroadcaster {
    backlog: Arc<Backlog>,
    messenger: Arc<dyn MessagingPort>,
    span: Span,
}

impl ReminderBroadcaster {
    pub fn new(backlog: Arc<Backlog>, messenger: Arc<dyn MessagingPort>, span: Span) -> Self {
        Self {
            backlog,
            messenger,
            span,
        }
    }

    /// Serve every user their next task (or the matching notice).
    ///
    /// A failure for one user is logged and counted; it never stops the
    /// broadcast. Only failing to list users is an error.
    pub async fn broadcast(&self) -> Result<BroadcastReport> {
        async {
            let users = self
                .backlog
                .users()
                .await
                .inspect_err(|e| warn!(error = %e, "could not list users"))?;

            let mut report = BroadcastReport {
                users: users.len(),
                ..Default::default()
            };
            for user in &users {
                if self.remind(user).await {
                    report.delivered += 1;
                } else {
                    report.failed += 1;
                }
            }

            info!(
                users = report.users,
                delivered = report.delivered,
                failed = report.failed,
                "reminders sent"
            );
            Ok(report)
        }
        .instrument(tracing::info_span!(parent: &self.span, "broadcast"))
        .await
    }

    async fn remind(&self, user: &User) -> bool {
        let (text, ok) = match replies::for_next_task(self.backlog.next_task(user).await) {
            Ok(text) => (text, true),
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "could not pick reminder task");
                (replies::GENERIC_FAILURE.to_string(), false)
            }
        };

        match self.messenger.send_text(user.chat_id, &text).await {
            Ok(_) => ok,
            Err(e) => {
                warn!(user_id = %user.id, chat_id = %user.chat_id, error = %e, "could not send reminder");
                false
            }
        }
    }
}
