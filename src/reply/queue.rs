//! 返信キュー
//!
//! 容量を超えて追加すると最も古い未表示の返信を捨てる FIFO。

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use uuid::Uuid;

/// 既定の容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// 表示待ちの返信
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedReply {
    pub id: Uuid,
    pub text: String,
    /// 返信先の視聴者名
    pub username: String,
    pub created_at: DateTime<Local>,
}

impl QueuedReply {
    pub fn new(text: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            username: username.into(),
            created_at: Local::now(),
        }
    }
}

/// 返信キュー
pub struct ReplyQueue {
    items: Mutex<VecDeque<QueuedReply>>,
    capacity: usize,
    notify: Notify,
}

impl ReplyQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// 返信を追加（満杯なら最古を捨てる）。捨てた返信を返す
    pub fn push(&self, reply: QueuedReply) -> Option<QueuedReply> {
        let dropped = {
            let mut items = self.items.lock();
            let dropped = if items.len() >= self.capacity {
                items.pop_front()
            } else {
                None
            };
            items.push_back(reply);
            dropped
        };

        if let Some(ref dropped) = dropped {
            tracing::debug!(
                "🗑️ 返信キューが満杯のため最古の返信を破棄: {} ({})",
                dropped.id,
                dropped.username
            );
        }
        self.notify.notify_one();
        dropped
    }

    /// 先頭を取り出す
    pub fn pop(&self) -> Option<QueuedReply> {
        self.items.lock().pop_front()
    }

    /// 返信が追加されるまで待つ
    pub async fn wait(&self) {
        if !self.is_empty() {
            return;
        }
        self.notify.notified().await;
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ReplyQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = ReplyQueue::default();
        queue.push(QueuedReply::new("a", "u1"));
        queue.push(QueuedReply::new("b", "u2"));

        assert_eq!(queue.pop().unwrap().text, "a");
        assert_eq!(queue.pop().unwrap().text, "b");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = ReplyQueue::default();
        for i in 0..10 {
            assert!(queue.push(QueuedReply::new(format!("r{}", i), "u")).is_none());
        }
        assert_eq!(queue.len(), 10);

        let dropped = queue.push(QueuedReply::new("r10", "u")).unwrap();
        assert_eq!(dropped.text, "r0");
        assert_eq!(queue.len(), 10);
        assert_eq!(queue.pop().unwrap().text, "r1");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let queue = ReplyQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(QueuedReply::new("a", "u"));
        queue.push(QueuedReply::new("b", "u"));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop().unwrap().text, "b");
    }

    #[test]
    fn test_concurrent_push_never_exceeds_capacity() {
        let queue = Arc::new(ReplyQueue::default());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(QueuedReply::new(format!("{}-{}", t, i), "u"));
                        assert!(queue.len() <= 10);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 10);
    }

    #[test]
    fn test_wait_pending_until_push() {
        let queue = ReplyQueue::default();
        let mut wait = tokio_test::task::spawn(queue.wait());
        tokio_test::assert_pending!(wait.poll());

        queue.push(QueuedReply::new("hello", "Alice"));
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_wait_wakes_on_push() {
        let queue = Arc::new(ReplyQueue::default());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                queue.wait().await;
                queue.pop()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(QueuedReply::new("hello", "Alice"));

        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.unwrap().text, "hello");
    }
}
