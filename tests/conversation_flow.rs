use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use legal_chat_client::{
    AssistantBackend, ChatController, ChatReply, ClientError, Conversation,
    ConversationRepository, MemoryStore, Message, MessageRole,
};

#[derive(Clone)]
enum Script {
    Reply(String),
    ServerError,
}

/// Scripted stand-in for the remote assistant: plays responses in order,
/// repeating the last one, and counts round-trips.
struct StubBackend {
    script: Mutex<Vec<Script>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl StubBackend {
    fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(script: Vec<Script>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(script)
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Script {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        }
    }
}

#[async_trait]
impl AssistantBackend for StubBackend {
    async fn send(
        &self,
        _message: &str,
        conversation_id: &str,
        _user_id: &str,
    ) -> Result<ChatReply, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.next_step() {
            Script::Reply(text) => Ok(ChatReply {
                message: text,
                conversation_id: conversation_id.to_string(),
                timestamp: Utc::now(),
                sources: Vec::new(),
            }),
            Script::ServerError => Err(ClientError::Server),
        }
    }
}

fn setup(backend: StubBackend) -> (Arc<ChatController>, Arc<StubBackend>, Arc<ConversationRepository>) {
    let repository = Arc::new(ConversationRepository::new(Arc::new(MemoryStore::new())));
    let backend = Arc::new(backend);
    let controller = Arc::new(ChatController::new(
        repository.clone(),
        backend.clone(),
        "user_001".to_string(),
    ));
    (controller, backend, repository)
}

const QUESTION: &str = "Quels droits a le client face à sa banque ?";

#[tokio::test]
async fn successful_send_appends_user_then_assistant() {
    let (controller, _, repository) = setup(StubBackend::new(vec![Script::Reply(
        "Le client dispose de plusieurs recours.".to_string(),
    )]));
    controller.initialize();

    controller.send_message(QUESTION).await;

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_loading);
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.messages[0].role, MessageRole::User);
    assert_eq!(snapshot.messages[0].content, QUESTION);
    assert_eq!(snapshot.messages[1].role, MessageRole::Assistant);

    let conv = &snapshot.conversations[0];
    assert_eq!(conv.message_count, 2);
    // 43-character question: the title is cut at 30, the preview fits
    let expected_title: String = QUESTION.chars().take(30).collect();
    assert_eq!(conv.title, format!("{}...", expected_title));
    assert_eq!(conv.last_message.as_deref(), Some(QUESTION));

    // The exchange reached the store
    let conversation_id = snapshot.current_conversation_id.unwrap();
    let persisted = repository.load_messages(&conversation_id);
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[0].content, QUESTION);
}

#[tokio::test]
async fn blank_input_is_a_noop_without_network_call() {
    let (controller, backend, _) = setup(StubBackend::new(vec![Script::Reply(
        "jamais envoyé".to_string(),
    )]));
    controller.initialize();

    controller.send_message("   \t  ").await;

    let snapshot = controller.snapshot();
    assert_eq!(backend.calls(), 0);
    assert!(snapshot.messages.is_empty());
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.conversations[0].message_count, 0);
}

#[tokio::test]
async fn start_new_conversation_is_unique_and_becomes_active() {
    let (controller, _, _) = setup(StubBackend::new(vec![Script::Reply("ok".to_string())]));
    controller.initialize();

    let first = controller.snapshot().current_conversation_id.unwrap();
    let second = controller.start_new_conversation();

    assert_ne!(first, second);
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_conversation_id.as_deref(), Some(second.as_str()));
    assert_eq!(snapshot.conversations.len(), 2);
    assert_eq!(snapshot.conversations[0].id, second);
    assert_eq!(snapshot.conversations[0].message_count, 0);
    assert!(snapshot.messages.is_empty());
}

#[tokio::test]
async fn deleting_the_active_conversation_opens_a_fresh_one() {
    let (controller, _, repository) = setup(StubBackend::new(vec![Script::Reply(
        "réponse".to_string(),
    )]));
    controller.initialize();
    controller.send_message("première question").await;

    let deleted = controller.snapshot().current_conversation_id.unwrap();
    assert_eq!(repository.load_messages(&deleted).len(), 2);

    controller.delete_conversation(&deleted);

    let snapshot = controller.snapshot();
    let fresh = snapshot.current_conversation_id.unwrap();
    assert_ne!(fresh, deleted);
    assert!(snapshot.messages.is_empty());
    assert!(snapshot.conversations.iter().all(|c| c.id != deleted));
    assert!(repository.load_messages(&deleted).is_empty());
}

#[tokio::test]
async fn server_error_surfaces_and_leaves_the_log_untouched() {
    let (controller, _, repository) = setup(StubBackend::new(vec![Script::ServerError]));
    controller.initialize();

    controller.send_message("question sans réponse").await;

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_loading);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("Erreur du serveur. Veuillez réessayer.")
    );
    assert!(snapshot.messages.is_empty());
    assert_eq!(snapshot.conversations[0].message_count, 0);

    let conversation_id = snapshot.current_conversation_id.unwrap();
    assert!(repository.load_messages(&conversation_id).is_empty());

    controller.clear_error();
    assert!(controller.snapshot().error.is_none());
}

#[tokio::test]
async fn a_successful_send_clears_a_prior_error() {
    let (controller, _, _) = setup(StubBackend::new(vec![
        Script::ServerError,
        Script::Reply("cette fois ça passe".to_string()),
    ]));
    controller.initialize();

    controller.send_message("tentative une").await;
    assert!(controller.snapshot().error.is_some());

    controller.send_message("tentative deux").await;
    let snapshot = controller.snapshot();
    assert!(snapshot.error.is_none());
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn initialization_activates_the_most_recent_conversation() {
    let repository = Arc::new(ConversationRepository::new(Arc::new(MemoryStore::new())));

    let mut older = Conversation::new();
    older.updated_at = Utc::now() - ChronoDuration::hours(3);
    let newer = Conversation::new();

    let newer_log = vec![
        Message::new(newer.id.clone(), MessageRole::User, "question".to_string()),
        Message::new(newer.id.clone(), MessageRole::Assistant, "réponse".to_string()),
    ];
    repository.save_messages(&newer.id, &newer_log);
    // Stored oldest-first on purpose
    repository.save_conversation_list(&[older.clone(), newer.clone()]);

    let backend = Arc::new(StubBackend::new(vec![Script::Reply("ok".to_string())]));
    let controller = ChatController::new(repository, backend, "user_001".to_string());
    controller.initialize();

    let snapshot = controller.snapshot();
    assert_eq!(
        snapshot.current_conversation_id.as_deref(),
        Some(newer.id.as_str())
    );
    assert_eq!(snapshot.conversations[0].id, newer.id);
    assert_eq!(snapshot.conversations[1].id, older.id);
    assert_eq!(snapshot.messages.len(), 2);
}

#[tokio::test]
async fn overlapping_sends_keep_both_exchanges() {
    let (controller, _, repository) = setup(StubBackend::with_delay(
        vec![Script::Reply("réponse".to_string())],
        Duration::from_millis(50),
    ));
    controller.initialize();

    tokio::join!(
        controller.send_message("premier message"),
        controller.send_message("second message"),
    );

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.messages.len(), 4);
    assert_eq!(snapshot.conversations[0].message_count, 4);

    let conversation_id = snapshot.current_conversation_id.unwrap();
    let persisted = repository.load_messages(&conversation_id);
    assert_eq!(persisted.len(), 4);
    let contents: Vec<&str> = persisted.iter().map(|m| m.content.as_str()).collect();
    assert!(contents.contains(&"premier message"));
    assert!(contents.contains(&"second message"));
}

#[tokio::test]
async fn a_reply_landing_after_a_switch_is_persisted_not_displayed() {
    let (controller, _, repository) = setup(StubBackend::with_delay(
        vec![Script::Reply("réponse tardive".to_string())],
        Duration::from_millis(100),
    ));
    controller.initialize();
    let original = controller.snapshot().current_conversation_id.unwrap();

    let background = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.send_message("question lente").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // User opens a new consultation while the reply is in flight
    let fresh = controller.start_new_conversation();
    background.await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_conversation_id.as_deref(), Some(fresh.as_str()));
    assert!(snapshot.messages.is_empty());

    // The exchange still reached the original conversation's log
    let persisted = repository.load_messages(&original);
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[0].content, "question lente");
    let original_summary = snapshot
        .conversations
        .iter()
        .find(|c| c.id == original)
        .unwrap();
    assert_eq!(original_summary.message_count, 2);
}

#[tokio::test]
async fn a_reply_for_a_deleted_conversation_is_dropped() {
    let (controller, _, repository) = setup(StubBackend::with_delay(
        vec![Script::Reply("réponse orpheline".to_string())],
        Duration::from_millis(100),
    ));
    controller.initialize();
    let doomed = controller.snapshot().current_conversation_id.unwrap();

    let background = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.send_message("question condamnée").await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    controller.delete_conversation(&doomed);
    background.await.unwrap();

    let snapshot = controller.snapshot();
    assert!(snapshot.conversations.iter().all(|c| c.id != doomed));
    assert!(repository.load_messages(&doomed).is_empty());
}
