use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use crate::conversation::session::{Conversation, ConversationKey};

/// Live conversations keyed by (chat, user).
///
/// Each conversation has its own lock, so the map lock is only held for
/// lookups and inserts.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationKey, Arc<Mutex<Conversation>>>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: ConversationKey) -> Option<Arc<Mutex<Conversation>>> {
        self.conversations.read().await.get(&key).cloned()
    }

    /// Locks the conversation for `key`, creating it if needed. A sweep can
    /// only reclaim unlocked conversations, so once this returns the guard
    /// belongs to the conversation the store holds.
    pub async fn acquire(&self, key: ConversationKey) -> OwnedMutexGuard<Conversation> {
        loop {
            let conversation = self.get_or_create(key).await;
            if let Some(guard) = self.lock_if_current(key, conversation).await {
                return guard;
            }
            debug!(chat_id = key.chat_id, user_id = key.user_id, "Conversation reclaimed before lock, retrying");
        }
    }

    /// Locks `conversation` and checks the store still maps `key` to it.
    async fn lock_if_current(
        &self,
        key: ConversationKey,
        conversation: Arc<Mutex<Conversation>>,
    ) -> Option<OwnedMutexGuard<Conversation>> {
        let guard = Arc::clone(&conversation).lock_owned().await;
        let current = self.get(key).await?;
        Arc::ptr_eq(&current, &conversation).then_some(guard)
    }

    async fn get_or_create(&self, key: ConversationKey) -> Arc<Mutex<Conversation>> {
        if let Some(conversation) = self.get(key).await {
            return conversation;
        }

        let mut conversations = self.conversations.write().await;
        Arc::clone(
            conversations
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(key)))),
        )
    }

    pub async fn remove(&self, key: ConversationKey) -> bool {
        self.conversations.write().await.remove(&key).is_some()
    }

    pub async fn len(&self) -> usize {
        self.conversations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.conversations.read().await.is_empty()
    }

    /// Drops conversations idle for longer than `inactivity`. A conversation
    /// whose lock is held is being handled and always survives.
    pub async fn sweep(&self, inactivity: chrono::Duration) -> usize {
        let cutoff = Utc::now() - inactivity;
        let mut conversations = self.conversations.write().await;
        let before = conversations.len();

        conversations.retain(|key, conversation| match conversation.try_lock() {
            Ok(conversation) => {
                let keep = !conversation.is_inactive_since(cutoff);
                if !keep {
                    debug!(chat_id = key.chat_id, user_id = key.user_id, "Reclaiming idle conversation");
                }
                keep
            }
            Err(_) => true,
        });

        before - conversations.len()
    }
}
