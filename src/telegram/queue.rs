//! Per-chat update queues.
//!
//! Updates of one chat are handled one after another in arrival order by a worker
//! task that exists only while that chat has pending work. Different chats run in
//! parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::SendError};

use crate::models::ChatId;

type Workers<T> = Arc<Mutex<HashMap<ChatId, UnboundedSender<T>>>>;

pub struct ChatQueues<T> {
    workers: Workers<T>,
}

impl<T: Send + 'static> ChatQueues<T> {
    pub fn new() -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Queue `item` behind the chat's pending items, starting a worker running
    /// `handle` if the chat has none
    pub fn push<F, Fut>(&self, chat: ChatId, item: T, handle: F)
    where
        F: Fn(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // senders are only used under this lock, and a worker only leaves under it
        // after finding its queue empty, so nothing queued is ever dropped
        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        let item = match workers.get(&chat) {
            Some(sender) => match sender.send(item) {
                Ok(()) => return,
                // the worker died mid-item; start over with a fresh one
                Err(SendError(item)) => item,
            },
            None => item,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(item).is_err() {
            return;
        }
        workers.insert(chat, sender);
        drop(workers);

        tokio::spawn(drain(self.workers.clone(), chat, receiver, handle));
    }

    /// Chats with queued or running work
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.workers.lock().unwrap().len()
    }
}

async fn drain<T, F, Fut>(workers: Workers<T>, chat: ChatId, mut receiver: UnboundedReceiver<T>, handle: F)
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        let item = {
            let mut workers = workers.lock().unwrap_or_else(PoisonError::into_inner);
            match receiver.try_recv() {
                Ok(item) => item,
                Err(_) => {
                    workers.remove(&chat);
                    return;
                }
            }
        };

        handle(item).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn settle(queues: &ChatQueues<u64>) {
        while queues.active() > 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_chat_keeps_arrival_order() {
        let queues = ChatQueues::new();
        let handled = Arc::new(Mutex::new(Vec::new()));

        // earlier items take longer, so unordered handling would finish them last
        for n in 0..20u64 {
            let handled = handled.clone();
            queues.push(ChatId(1), n, move |n| {
                let handled = handled.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(100 - n * 5)).await;
                    handled.lock().unwrap().push(n);
                }
            });
        }

        settle(&queues).await;
        assert_eq!(*handled.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chats_run_independently() {
        let queues = ChatQueues::new();
        let handled = Arc::new(Mutex::new(Vec::new()));

        for (chat, delay) in [(1, 500u64), (2, 10)] {
            let handled = handled.clone();
            queues.push(ChatId(chat), delay, move |delay| {
                let handled = handled.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    handled.lock().unwrap().push(chat);
                }
            });
        }

        settle(&queues).await;
        assert_eq!(*handled.lock().unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_idle_chat_is_forgotten_and_restarts() {
        let queues = ChatQueues::new();
        let handled = Arc::new(Mutex::new(Vec::new()));

        for round in 0..2u64 {
            let sink = handled.clone();
            queues.push(ChatId(7), round, move |n| {
                let sink = sink.clone();
                async move { sink.lock().unwrap().push(n) }
            });
            settle(&queues).await;
            assert_eq!(queues.active(), 0);
        }

        assert_eq!(*handled.lock().unwrap(), vec![0, 1]);
    }
}
