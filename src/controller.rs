use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

use crate::client::AssistantBackend;
use crate::models::{Conversation, Message, MessageRole};
use crate::repository::ConversationRepository;

/// Cheap copy of the controller state, handed to the presentation layer
#[derive(Debug, Clone, Default)]
pub struct ChatSnapshot {
    pub conversations: Vec<Conversation>,
    pub messages: Vec<Message>,
    pub current_conversation_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
struct ChatState {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    current_conversation_id: Option<String>,
    is_loading: bool,
    error: Option<String>,
}

/// -----------------------------
/// Conversation State Controller
/// -----------------------------
/// Single authoritative in-memory view of the active conversation,
/// orchestrating the assistant backend and the repository. The state lock
/// is never held across an await; overlapping sends targeting one
/// conversation are serialized by a per-conversation lock so interleaved
/// append-and-persist steps cannot drop an exchange.
pub struct ChatController {
    repository: Arc<ConversationRepository>,
    backend: Arc<dyn AssistantBackend>,
    user_id: String,
    state: Mutex<ChatState>,
    send_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ChatController {
    pub fn new(
        repository: Arc<ConversationRepository>,
        backend: Arc<dyn AssistantBackend>,
        user_id: String,
    ) -> Self {
        Self {
            repository,
            backend,
            user_id,
            state: Mutex::new(ChatState::default()),
            send_locks: Mutex::new(HashMap::new()),
        }
    }

    /// First activation: resume the most recently updated conversation, or
    /// start fresh so the store is never left empty-but-uninitialized.
    pub fn initialize(&self) {
        let conversations = self.repository.load_conversation_list();
        if conversations.is_empty() {
            self.start_new_conversation();
            return;
        }

        let active = conversations[0].clone();
        let messages = self.repository.load_messages(&active.id);
        info!(
            "Resuming conversation {} ({} messages)",
            active.id,
            messages.len()
        );

        let mut st = self.state.lock().unwrap();
        st.conversations = conversations;
        st.current_conversation_id = Some(active.id);
        st.messages = messages;
        st.is_loading = false;
        st.error = None;
    }

    /// Open a fresh consultation and make it active. Always succeeds.
    pub fn start_new_conversation(&self) -> String {
        let conversation = Conversation::new();
        let id = conversation.id.clone();

        let list = {
            let mut st = self.state.lock().unwrap();
            st.conversations.insert(0, conversation);
            st.current_conversation_id = Some(id.clone());
            st.messages.clear();
            st.error = None;
            st.conversations.clone()
        };
        self.repository.save_conversation_list(&list);

        id
    }

    /// One user/assistant exchange. Blank input is a no-op. Failures leave
    /// the message list untouched and surface a single error string.
    pub async fn send_message(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }

        let conversation_id = {
            let current = self
                .state
                .lock()
                .unwrap()
                .current_conversation_id
                .clone();
            match current {
                Some(id) => id,
                None => self.start_new_conversation(),
            }
        };

        // Serialize sends per conversation: a second call while the first
        // is in flight waits here instead of interleaving its append
        let send_lock = {
            let mut locks = self.send_locks.lock().unwrap();
            locks
                .entry(conversation_id.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let _guard = send_lock.lock().await;

        {
            let mut st = self.state.lock().unwrap();
            st.is_loading = true;
            st.error = None;
        }

        let result = self
            .backend
            .send(trimmed, &conversation_id, &self.user_id)
            .await;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let mut st = self.state.lock().unwrap();
                st.is_loading = false;
                st.error = Some(e.to_string());
                return;
            }
        };

        let user_msg = Message::new(
            conversation_id.clone(),
            MessageRole::User,
            trimmed.to_string(),
        );
        let assistant_msg = Message::assistant_reply(
            conversation_id.clone(),
            reply.message,
            reply.timestamp,
            reply.sources,
        );

        let (appended_log, list) = {
            let mut st = self.state.lock().unwrap();
            st.is_loading = false;

            let Some(conv) = st
                .conversations
                .iter_mut()
                .find(|c| c.id == conversation_id)
            else {
                // Conversation deleted while the request was in flight:
                // the reply has no home, drop it
                return;
            };
            conv.record_exchange(&user_msg.content);
            st.conversations
                .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

            let appended = if st.current_conversation_id.as_deref()
                == Some(conversation_id.as_str())
            {
                st.messages.push(user_msg.clone());
                st.messages.push(assistant_msg.clone());
                Some(st.messages.clone())
            } else {
                None
            };
            (appended, st.conversations.clone())
        };

        // The user switched away mid-request: rebuild the log from the
        // store instead of a stale snapshot
        let log = appended_log.unwrap_or_else(|| {
            let mut log = self.repository.load_messages(&conversation_id);
            log.push(user_msg);
            log.push(assistant_msg);
            log
        });
        self.repository.save_messages(&conversation_id, &log);
        self.repository.save_conversation_list(&list);
    }

    /// Switch the active conversation to the persisted log of `id`
    pub fn load_conversation(&self, id: &str) {
        let messages = self.repository.load_messages(id);

        let mut st = self.state.lock().unwrap();
        st.current_conversation_id = Some(id.to_string());
        st.messages = messages;
        st.error = None;
        st.is_loading = false;
    }

    /// Remove a conversation and its log. Deleting the active conversation
    /// immediately opens a fresh one so the UI never points at a ghost.
    pub fn delete_conversation(&self, id: &str) {
        self.repository.delete_messages(id);
        self.send_locks.lock().unwrap().remove(id);

        let (was_active, list) = {
            let mut st = self.state.lock().unwrap();
            st.conversations.retain(|c| c.id != id);
            let was_active = st.current_conversation_id.as_deref() == Some(id);
            (was_active, st.conversations.clone())
        };
        self.repository.save_conversation_list(&list);

        if was_active {
            self.start_new_conversation();
        }
    }

    pub fn clear_error(&self) {
        self.state.lock().unwrap().error = None;
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        let st = self.state.lock().unwrap();
        ChatSnapshot {
            conversations: st.conversations.clone(),
            messages: st.messages.clone(),
            current_conversation_id: st.current_conversation_id.clone(),
            is_loading: st.is_loading,
            error: st.error.clone(),
        }
    }
}
