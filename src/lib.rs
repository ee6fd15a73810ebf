pub mod app_config;
pub mod client;
pub mod controller;
pub mod health;
pub mod models;
pub mod repository;
pub mod storage;
pub mod ui;

pub use app_config::AppConfig;
pub use client::{AssistantBackend, AssistantClient, ChatReply, ClientError};
pub use controller::{ChatController, ChatSnapshot};
pub use health::HealthMonitor;
pub use models::{Conversation, Message, MessageRole, Source};
pub use repository::ConversationRepository;
pub use storage::{FileStore, KeyValueStore, MemoryStore};

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Wire a controller onto a file-backed store under `data_dir`
pub fn open_file_backed(
    data_dir: &Path,
    backend: Arc<dyn AssistantBackend>,
    user_id: String,
) -> Result<ChatController> {
    let store = FileStore::new(data_dir);
    store.initialize()?;
    let repository = Arc::new(ConversationRepository::new(Arc::new(store)));
    Ok(ChatController::new(repository, backend, user_id))
}
