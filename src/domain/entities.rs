//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/IO types here — these are mapped from adapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An uploaded document tracked by the backend.
///
/// Status transitions are driven by backend processing and observed via
/// refetch; the client never mutates a document except by replacing it
/// wholesale on upload or selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub status: DocumentStatus,
    pub file_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Failed,
}

/// Result of a processing-status probe against the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCheck {
    pub outcome: StatusOutcome,
    pub message: String,
    pub document: Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    Success,
    Pending,
    Error,
    Warning,
}

/// Rendered view of a document's content. Server-truth only: replaced
/// wholesale on refresh, never merged or locally edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPreview {
    pub id: String,
    pub content: String,
    pub mime_type: String,
    pub version: u32,
    pub last_updated: DateTime<Utc>,
}

/// AI-derived insights attached to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub id: String,
    pub document_id: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub sentiment: String,
    pub entities: BTreeMap<String, Vec<String>>,
    pub topics: Vec<String>,
    pub status: AnalysisStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Limited,
}

impl DocumentAnalysis {
    /// Locally synthesized placeholder used when the backend cannot produce
    /// a real analysis. Keeps chat usable: status `Limited`, empty
    /// collections, fixed explanatory summary.
    pub fn fallback(document_id: &str) -> Self {
        Self {
            id: format!("fallback-{}", Utc::now().timestamp_millis()),
            document_id: document_id.to_string(),
            summary: "Automatic analysis is currently unavailable for this document. \
                      You can still chat about it, but AI insights may be limited."
                .to_string(),
            keywords: Vec::new(),
            sentiment: "neutral".to_string(),
            entities: BTreeMap::new(),
            topics: Vec::new(),
            status: AnalysisStatus::Limited,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Failed-status placeholder committed after retry exhaustion so the UI
    /// shows why insights are missing instead of an empty slot.
    pub fn failed(document_id: &str, reason: &str) -> Self {
        Self {
            id: format!("failed-{}", Utc::now().timestamp_millis()),
            document_id: document_id.to_string(),
            summary: "Analysis failed. Send \"retry analysis\" in the chat to try again."
                .to_string(),
            keywords: Vec::new(),
            sentiment: "neutral".to_string(),
            entities: BTreeMap::new(),
            topics: Vec::new(),
            status: AnalysisStatus::Failed,
            error_message: Some(reason.to_string()),
            created_at: Utc::now(),
        }
    }
}

/// Identity of a chat message. Optimistic entries carry a client-generated
/// `Pending` id until the server round-trip confirms or removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageId {
    Pending(String),
    Confirmed(String),
}

impl MessageId {
    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Pending(id) | MessageId::Confirmed(id) => id,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

/// One turn in the document conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub document_id: String,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn system(document_id: &str, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::Confirmed(format!("system-{}", Utc::now().timestamp_millis())),
            document_id: document_id.to_string(),
            content: content.into(),
            sender: Sender::System,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant_local(document_id: &str, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::Confirmed(format!("local-{}", Utc::now().timestamp_millis())),
            document_id: document_id.to_string(),
            content: content.into(),
            sender: Sender::Assistant,
            timestamp: Utc::now(),
        }
    }
}

/// The matched user/assistant pair returned by a chat send. Guaranteed
/// non-partial: the gateway synthesizes any half the backend omits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatExchange {
    pub user_message: ChatMessage,
    pub assistant_message: ChatMessage,
}

/// Transient per-attempt upload tracking. Cleared on the next upload or on
/// document switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadState {
    pub uploading: bool,
    pub progress: u8,
    pub error: Option<String>,
}

impl UploadState {
    pub fn started() -> Self {
        Self {
            uploading: true,
            progress: 0,
            error: None,
        }
    }
}

/// Raw bytes of a generated/processed document, ready to save to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: String,
}

/// Toast-style notification delivered on the side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl Notice {
    pub fn info(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            title: title.to_string(),
            message: message.into(),
        }
    }

    pub fn error(title: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            message: message.into(),
        }
    }
}
