//! Wire records for the backend JSON contract, plus mapping into domain
//! entities.
//!
//! Mapping is deliberately liberal: ids may arrive as strings or numbers,
//! optional fields get sensible defaults, and the chat reply synthesizes
//! any half the backend omits so callers always receive a full exchange.

use crate::domain::{
    AnalysisStatus, ChatExchange, ChatMessage, Document, DocumentAnalysis, DocumentPreview,
    DocumentStatus, MessageId, Sender, StatusCheck, StatusOutcome,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Accept both `"42"` and `42` for identifiers.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Some(de_id(deserializer)?))
}

#[derive(Debug, Deserialize)]
pub struct DocumentRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub processing_status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    pub fn into_document(self) -> Document {
        let status = match self.processing_status.as_deref() {
            Some("success") => DocumentStatus::Ready,
            Some("failed") => DocumentStatus::Failed,
            _ => DocumentStatus::Processing,
        };
        Document {
            id: self.id,
            name: self.title,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            status,
            file_type: self.document_type.unwrap_or_else(|| "other".to_string()),
        }
    }

    /// Derive the status-probe outcome from the raw record.
    pub fn into_status_check(self) -> StatusCheck {
        let (outcome, message) = match self.processing_status.as_deref() {
            Some("success") => (StatusOutcome::Success, "Document is ready.".to_string()),
            Some("pending") | Some("processing") => (
                StatusOutcome::Pending,
                "Document is still being processed.".to_string(),
            ),
            Some("failed") => (
                StatusOutcome::Error,
                self.error_message
                    .clone()
                    .unwrap_or_else(|| "Document processing failed.".to_string()),
            ),
            other => (
                StatusOutcome::Warning,
                format!("Unrecognized processing status: {}", other.unwrap_or("none")),
            ),
        };
        StatusCheck {
            outcome,
            message,
            document: self.into_document(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreviewRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl PreviewRecord {
    pub fn into_preview(self) -> DocumentPreview {
        DocumentPreview {
            id: self.id,
            content: self.content,
            mime_type: self.mime_type.unwrap_or_else(|| "text/html".to_string()),
            version: self.version.unwrap_or(1),
            last_updated: self.last_updated.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AnalysisRecord {
    pub fn into_analysis(self, document_id: &str) -> DocumentAnalysis {
        let status = match self.status.as_deref() {
            Some("processing") => AnalysisStatus::Processing,
            Some("completed") | None => AnalysisStatus::Completed,
            Some("failed") => AnalysisStatus::Failed,
            Some("limited") => AnalysisStatus::Limited,
            Some(_) => AnalysisStatus::Pending,
        };
        DocumentAnalysis {
            id: self.id,
            document_id: self
                .document_id
                .unwrap_or_else(|| document_id.to_string()),
            summary: self.summary,
            keywords: self.keywords,
            sentiment: self.sentiment.unwrap_or_else(|| "neutral".to_string()),
            entities: self.entities,
            topics: self.topics,
            status,
            error_message: self.error_message,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRecord {
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub document_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageRecord {
    pub fn into_message(self, document_id: &str) -> ChatMessage {
        let sender = match self.sender.as_deref() {
            Some("user") => Sender::User,
            Some("system") => Sender::System,
            _ => Sender::Assistant,
        };
        ChatMessage {
            id: MessageId::Confirmed(
                self.id
                    .unwrap_or_else(|| format!("msg-{}", Utc::now().timestamp_millis())),
            ),
            document_id: self
                .document_id
                .unwrap_or_else(|| document_id.to_string()),
            content: self.content,
            sender,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatSendResponse {
    #[serde(default)]
    pub conversation: Option<ConversationRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub user_message: Option<MessageRecord>,
    #[serde(default)]
    pub system_response: Option<MessageRecord>,
}

impl ChatSendResponse {
    /// Always yields a full user/assistant pair. A missing user half is
    /// rebuilt from the content we sent; a missing assistant half becomes a
    /// minimal placeholder reply.
    pub fn into_exchange(self, document_id: &str, sent_content: &str) -> ChatExchange {
        let conversation = self.conversation.unwrap_or_default();

        let mut user_message = match conversation.user_message {
            Some(record) => record.into_message(document_id),
            None => ChatMessage {
                id: MessageId::Confirmed(format!(
                    "synth-user-{}",
                    Utc::now().timestamp_millis()
                )),
                document_id: document_id.to_string(),
                content: sent_content.to_string(),
                sender: Sender::User,
                timestamp: Utc::now(),
            },
        };
        user_message.sender = Sender::User;

        let mut assistant_message = match conversation.system_response {
            Some(record) => record.into_message(document_id),
            None => ChatMessage {
                id: MessageId::Confirmed(format!(
                    "synth-assistant-{}",
                    Utc::now().timestamp_millis()
                )),
                document_id: document_id.to_string(),
                content: "I processed your request, but no response content came back. \
                          Please try again."
                    .to_string(),
                sender: Sender::Assistant,
                timestamp: Utc::now(),
            },
        };
        assistant_message.sender = Sender::Assistant;

        ChatExchange {
            user_message,
            assistant_message,
        }
    }
}
