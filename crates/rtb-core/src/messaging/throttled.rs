use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::port::MessagingPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two sends (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = self.next.max(now);
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that spaces out outbound sends.
///
/// A reminder broadcast walks every user in one go; without spacing it would
/// trip Telegram's flood limits. Sends are delayed, never retried.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatId, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: ChatId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        // Forget chats whose next slot has already passed; a fresh limiter
        // would allow the same send.
        let now = Instant::now();
        map.retain(|_, limiter| {
            Arc::strong_count(limiter) > 1
                || limiter.try_lock().map(|l| l.next > now).unwrap_or(true)
        });
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let limiter = self.limiter_for_chat(chat_id).await;
            let mut guard = limiter.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_text(chat_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;

    struct Sink {
        sent: std::sync::Mutex<Vec<(i64, Instant)>>,
    }

    #[async_trait::async_trait]
    impl MessagingPort for Sink {
        async fn send_text(&self, chat_id: ChatId, _text: &str) -> Result<MessageRef> {
            self.sent.lock().unwrap().push((chat_id.0, Instant::now()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn spaces_sends_to_the_same_chat() {
        let sink = Arc::new(Sink {
            sent: std::sync::Mutex::new(Vec::new()),
        });
        let throttled = ThrottledMessenger::new(sink.clone(), ThrottleConfig::default());

        throttled.send_text(ChatId(1), "a").await.unwrap();
        throttled.send_text(ChatId(1), "b").await.unwrap();
        throttled.send_text(ChatId(2), "c").await.unwrap();

        let sent = sink.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 3);
        let same_chat_gap = sent[1].1 - sent[0].1;
        assert!(same_chat_gap >= Duration::from_millis(1050));
        // A different chat only waits for the global slot.
        let other_chat_gap = sent[2].1 - sent[1].1;
        assert!(other_chat_gap < Duration::from_millis(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn forgets_chats_that_went_quiet() {
        let sink = Arc::new(Sink {
            sent: std::sync::Mutex::new(Vec::new()),
        });
        let throttled = ThrottledMessenger::new(sink.clone(), ThrottleConfig::default());

        for chat in 1..=10 {
            throttled.send_text(ChatId(chat), "hi").await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        throttled.send_text(ChatId(11), "hi").await.unwrap();

        assert_eq!(throttled.per_chat.lock().await.len(), 1);
        assert_eq!(sink.sent.lock().unwrap().len(), 11);
    }
}
