use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::Conversation;
use crate::models::ChatId;

/// One dialog per chat, each behind its own lock.
///
/// A handler holds the chat's lock for the whole message, crawl included, so a
/// second message from the same chat waits for the first to finish. Different
/// chats never contend.
#[derive(Default)]
pub struct Sessions {
    chats: Mutex<HashMap<ChatId, Arc<Mutex<Conversation>>>>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session(&self, chat: ChatId) -> Arc<Mutex<Conversation>> {
        let mut chats = self.chats.lock().await;
        chats.entry(chat).or_default().clone()
    }

    /// Forget the chat's dialog if it is back at `Idle` and no handler holds it
    pub async fn release(&self, chat: ChatId) {
        let mut chats = self.chats.lock().await;

        if let Some(session) = chats.get(&chat)
            && Arc::strong_count(session) == 1
            && session
                .try_lock()
                .is_ok_and(|state| matches!(*state, Conversation::Idle))
        {
            chats.remove(&chat);
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.chats.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Stage;

    #[tokio::test]
    async fn test_same_chat_shares_state() {
        let sessions = Sessions::new();

        {
            let session = sessions.session(ChatId(1)).await;
            let mut state = session.lock().await;
            *state = Conversation::AwaitingDiscount {
                category: crate::models::Category {
                    name: "ropes".to_string(),
                    listing_url: "https://shop/ropes".to_string(),
                },
            };
        }

        let same = sessions.session(ChatId(1)).await;
        assert_eq!(same.lock().await.stage(), Stage::AwaitingDiscount);

        let other = sessions.session(ChatId(2)).await;
        assert_eq!(other.lock().await.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_release_forgets_idle_dialogs_only() {
        let sessions = Sessions::new();

        drop(sessions.session(ChatId(1)).await);
        let busy = sessions.session(ChatId(2)).await;
        {
            let session = sessions.session(ChatId(3)).await;
            *session.lock().await = Conversation::AwaitingCategory {
                categories: Default::default(),
            };
        }

        for chat in 1..=3 {
            sessions.release(ChatId(chat)).await;
        }
        assert_eq!(sessions.len().await, 2);

        drop(busy);
        sessions.release(ChatId(2)).await;
        assert_eq!(sessions.len().await, 1);

        // a released chat starts over from Idle
        assert_eq!(sessions.session(ChatId(1)).await.lock().await.stage(), Stage::Idle);
    }

    #[tokio::test]
    async fn test_second_message_waits_for_first() {
        let sessions = Arc::new(Sessions::new());
        let session = sessions.session(ChatId(1)).await;
        let held = session.lock().await;

        let waiting = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let session = sessions.session(ChatId(1)).await;
                let state = session.lock().await;
                state.stage()
            })
        };

        tokio::task::yield_now().await;
        assert!(!waiting.is_finished());

        drop(held);
        assert_eq!(waiting.await.unwrap(), Stage::Idle);
    }
}
