use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

use crate::models::Source;

/// Local validation limit, mirrored by the backend
pub const MAX_MESSAGE_LENGTH: usize = 5000;
/// Citations kept per assistant message, server order = relevance order
pub const MAX_SOURCES_PER_MESSAGE: usize = 5;

const CHAT_ENDPOINT: &str = "/v1/chat";
const HEALTH_ENDPOINT: &str = "/v1/health";
const TEST_ENDPOINT: &str = "/v1/chat/test";
const DOCUMENTS_ENDPOINT: &str = "/v1/documents";

/// Failure taxonomy of the remote assistant client. Display strings are
/// the exact user-facing messages.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Le message ne peut pas être vide")]
    EmptyMessage,
    #[error("Message trop long (maximum {MAX_MESSAGE_LENGTH} caractères)")]
    MessageTooLong,
    /// 400-class rejection, carrying the server-provided detail verbatim
    #[error("{0}")]
    Rejected(String),
    /// 500-class failure or request expiry
    #[error("Erreur du serveur. Veuillez réessayer.")]
    Server,
    #[error("Impossible de se connecter au serveur")]
    Unreachable,
    #[error("Erreur de communication avec le serveur")]
    Protocol,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

/// Source record as the backend emits it: same shape as the canonical
/// `Source` but under drifting field names, absorbed here via aliases.
#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "document", alias = "file")]
    document_name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default, alias = "relevance", alias = "relevance_score")]
    score: Option<f64>,
    #[serde(default, alias = "id")]
    chunk_id: Option<String>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, serde_json::Value>,
}

impl From<RawSource> for Source {
    fn from(raw: RawSource) -> Self {
        Source {
            title: raw.title,
            document_name: raw.document_name,
            url: raw.url,
            page: raw.page,
            source: raw.source,
            score: raw.score,
            chunk_id: raw.chunk_id,
            metadata: raw.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawChatResponse {
    message: String,
    conversation_id: String,
    timestamp: String,
    #[serde(default)]
    sources: Vec<RawSource>,
}

/// Parsed `/v1/chat` reply. Message construction stays with the caller.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub message: String,
    pub conversation_id: String,
    pub timestamp: DateTime<Utc>,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub version: String,
}

impl HealthCheck {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList {
    #[serde(default)]
    pub available_documents: Vec<String>,
    #[serde(default)]
    pub total_count: usize,
}

/// Error payload shape of the backend. FastAPI-style rejections put the
/// useful text under `detail`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Seam between the controller and the network, so tests can stub the
/// round-trip.
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    async fn send(
        &self,
        message: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ChatReply, ClientError>;
}

/// -----------------------------
/// Remote Assistant Client
/// -----------------------------
pub struct AssistantClient {
    client: Client,
    base_url: String,
    user_id: String,
}

impl AssistantClient {
    pub fn new(base_url: String, user_id: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("legal-chat-client/0.1")
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One round-trip against `/v1/chat`. Blank and oversized input fail
    /// fast without touching the network.
    pub async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        user_id: Option<&str>,
    ) -> Result<ChatReply, ClientError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(ClientError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ClientError::MessageTooLong);
        }

        let request = ChatRequest {
            message: trimmed,
            conversation_id,
            user_id,
        };

        debug!("POST {} (conversation {:?})", CHAT_ENDPOINT, conversation_id);
        let response = self
            .client
            .post(self.url(CHAT_ENDPOINT))
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            error!("Chat request failed with status {}", status);
            return Err(classify_status(status, body.detail.or(body.error)));
        }

        let raw: RawChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat response: {}", e);
            ClientError::Protocol
        })?;

        Ok(ChatReply {
            message: raw.message,
            conversation_id: raw.conversation_id,
            timestamp: parse_timestamp(&raw.timestamp),
            sources: normalize_sources(raw.sources.into_iter().map(Source::from).collect()),
        })
    }

    /// Liveness probe, independent of the message-sending path
    pub async fn check_health(&self) -> Result<HealthCheck, ClientError> {
        let response = self
            .client
            .get(self.url(HEALTH_ENDPOINT))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), None));
        }
        response.json().await.map_err(|_| ClientError::Protocol)
    }

    /// Cheap reachability check against the test endpoint
    pub async fn test_connection(&self) -> bool {
        let body = serde_json::json!({ "message": "ping", "user_id": self.user_id });
        match self
            .client
            .post(self.url(TEST_ENDPOINT))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn list_documents(&self) -> Result<DocumentList, ClientError> {
        let response = self
            .client
            .get(self.url(DOCUMENTS_ENDPOINT))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), None));
        }
        response.json().await.map_err(|_| ClientError::Protocol)
    }

    /// Fetch raw document bytes by name
    pub async fn fetch_document(&self, name: &str) -> Result<Bytes, ClientError> {
        let path = format!("{}/{}", DOCUMENTS_ENDPOINT, escape_document_name(name));
        let response = self
            .client
            .get(self.url(&path))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if !response.status().is_success() {
            return Err(classify_status(response.status(), None));
        }
        response.bytes().await.map_err(|_| ClientError::Protocol)
    }
}

#[async_trait]
impl AssistantBackend for AssistantClient {
    async fn send(
        &self,
        message: &str,
        conversation_id: &str,
        user_id: &str,
    ) -> Result<ChatReply, ClientError> {
        self.send_message(message, Some(conversation_id), Some(user_id))
            .await
    }
}

/// Map a failed HTTP status to the user-facing taxonomy
fn classify_status(status: StatusCode, detail: Option<String>) -> ClientError {
    if status.is_client_error() {
        ClientError::Rejected(detail.unwrap_or_else(|| "Requête invalide".to_string()))
    } else if status.is_server_error() {
        ClientError::Server
    } else {
        ClientError::Protocol
    }
}

/// Map a transport failure (no response received) to the taxonomy.
/// A timeout counts as the server failing to answer in time.
fn classify_transport_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        error!("Request timed out: {}", e);
        ClientError::Server
    } else if e.is_connect() {
        error!("Connection failed: {}", e);
        ClientError::Unreachable
    } else {
        error!("Request failed: {}", e);
        ClientError::Protocol
    }
}

/// The backend stamps replies with naive datetimes in some deployments;
/// accept both and fall back to now rather than dropping the exchange.
fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Normalize citations into their canonical shape: fill the document name
/// from its label alias, derive a readable title and a fetchable url when
/// missing, clamp the score, and cap the list at
/// `MAX_SOURCES_PER_MESSAGE` preserving server order. Running this on an
/// already-normalized list changes nothing.
pub fn normalize_sources(sources: Vec<Source>) -> Vec<Source> {
    sources
        .into_iter()
        .take(MAX_SOURCES_PER_MESSAGE)
        .map(normalize_source)
        .collect()
}

fn normalize_source(mut source: Source) -> Source {
    if source.document_name.is_none() {
        source.document_name = source.source.clone();
    }
    if source.source.is_none() {
        source.source = source.document_name.clone();
    }
    if source.title.is_none() {
        source.title = source.document_name.as_deref().map(document_title);
    }
    if let Some(score) = source.score {
        source.score = Some(score.clamp(0.0, 1.0));
    }
    if source.url.is_none() {
        if let Some(name) = source.document_name.as_deref() {
            source.url = Some(document_url(name, source.page));
        }
    }
    source
}

/// Human-readable title from a document file name:
/// "code_des_obligations.pdf" -> "Code Des Obligations"
fn document_title(document_name: &str) -> String {
    let stem = document_name.trim_end_matches(".pdf").replace('_', " ");
    stem.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fetchable document path for a citation, with an optional page anchor
fn document_url(document_name: &str, page: Option<u32>) -> String {
    let mut url = format!("{}/{}", DOCUMENTS_ENDPOINT, escape_document_name(document_name));
    if let Some(page) = page {
        url.push_str(&format!("#page={}", page));
    }
    url
}

/// Escape a document name for use as a URL path segment. Double-underscore
/// runs are artifacts of upstream path mangling and collapse to one.
fn escape_document_name(name: &str) -> String {
    let mut cleaned = name.to_string();
    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }
    urlencoding::encode(&cleaned).into_owned()
}
