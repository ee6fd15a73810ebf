use bytes::Bytes;
use std::sync::Arc;
use tracing::error;

use crate::models::{Conversation, Message};
use crate::storage::KeyValueStore;

/// Fixed key holding the serialized conversation summary array
const CONVERSATIONS_KEY: &str = "conversations";
/// Per-conversation message logs live under this prefix
const MESSAGES_KEY_PREFIX: &str = "messages_";

/// Serializes conversation summaries and message logs to the persistent
/// store. Persistence is a durability nice-to-have for the next session,
/// not a correctness requirement for this one: every failure is logged and
/// swallowed so the in-memory flow is never blocked.
pub struct ConversationRepository {
    store: Arc<dyn KeyValueStore>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn messages_key(conversation_id: &str) -> String {
        format!("{}{}", MESSAGES_KEY_PREFIX, conversation_id)
    }

    /// Overwrite the message log for a conversation
    pub fn save_messages(&self, conversation_id: &str, messages: &[Message]) {
        let payload = match serde_json::to_vec(messages) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize messages for {}: {}", conversation_id, e);
                return;
            }
        };
        if let Err(e) = self
            .store
            .set(&Self::messages_key(conversation_id), Bytes::from(payload))
        {
            error!("Failed to persist messages for {}: {}", conversation_id, e);
        }
    }

    /// Load the message log for a conversation; empty when absent or
    /// unparsable
    pub fn load_messages(&self, conversation_id: &str) -> Vec<Message> {
        let raw = match self.store.get(&Self::messages_key(conversation_id)) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Failed to read messages for {}: {}", conversation_id, e);
                return Vec::new();
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(messages) => messages,
            Err(e) => {
                error!("Corrupt message log for {}: {}", conversation_id, e);
                Vec::new()
            }
        }
    }

    /// Purge the message log for a conversation
    pub fn delete_messages(&self, conversation_id: &str) {
        if let Err(e) = self.store.delete(&Self::messages_key(conversation_id)) {
            error!("Failed to delete messages for {}: {}", conversation_id, e);
        }
    }

    pub fn save_conversation_list(&self, conversations: &[Conversation]) {
        let payload = match serde_json::to_vec(conversations) {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to serialize conversation list: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(CONVERSATIONS_KEY, Bytes::from(payload)) {
            error!("Failed to persist conversation list: {}", e);
        }
    }

    /// Load the summary list, most-recently-updated first
    pub fn load_conversation_list(&self) -> Vec<Conversation> {
        let raw = match self.store.get(CONVERSATIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Failed to read conversation list: {}", e);
                return Vec::new();
            }
        };
        let mut conversations: Vec<Conversation> = match serde_json::from_slice(&raw) {
            Ok(list) => list,
            Err(e) => {
                error!("Corrupt conversation list: {}", e);
                return Vec::new();
            }
        };
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }
}
