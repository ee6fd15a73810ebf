use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Maximum length of a conversation title derived from the first message
pub const TITLE_MAX_CHARS: usize = 30;
/// Maximum length of the last-message preview on a conversation summary
pub const PREVIEW_MAX_CHARS: usize = 50;
/// Title given to a conversation before its first exchange
pub const DEFAULT_CONVERSATION_TITLE: &str = "Nouvelle consultation";

/// Represents the role of a message sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// A citation backing an assistant message. Every field is optional: the
/// backend emits these with inconsistent coverage depending on which
/// document matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Originating-source label, usually the raw document identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Relevance score in 0..1, higher is better
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Represents a single message in a conversation. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Only meaningful on assistant messages; defaulted on older records
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Message {
    pub fn new(conversation_id: String, role: MessageRole, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            created_at: Utc::now(),
            conversation_id: Some(conversation_id),
            sources: Vec::new(),
        }
    }

    /// Assistant reply carrying the timestamp the server stamped on it
    pub fn assistant_reply(
        conversation_id: String,
        content: String,
        created_at: DateTime<Utc>,
        sources: Vec<Source>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: MessageRole::Assistant,
            content,
            created_at,
            conversation_id: Some(conversation_id),
            sources,
        }
    }
}

/// Summary of a conversation thread. The full message log is stored
/// separately, keyed by the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_CONVERSATION_TITLE.to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
            last_message: None,
        }
    }

    /// Fold a completed user/assistant exchange into the summary.
    /// The first exchange also names the conversation after the question.
    pub fn record_exchange(&mut self, user_message: &str) {
        if self.message_count == 0 {
            self.title = truncate_with_ellipsis(user_message, TITLE_MAX_CHARS);
        }
        self.message_count += 2;
        self.last_message = Some(truncate_with_ellipsis(user_message, PREVIEW_MAX_CHARS));
        self.updated_at = Utc::now();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut `text` to `max` characters, appending "..." when something was cut.
/// Character-based so multi-byte input never splits a boundary.
pub fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}
