//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters. Every operation returns a classified
//! `ApiError` so the retry policy can tell transient faults from control
//! signals.

use crate::domain::{
    ApiError, ChatExchange, ChatMessage, Document, DocumentAnalysis, DocumentPreview,
    DownloadPayload, Notice, OperationType, StatusCheck,
};

/// Document resource gateway. Upload, metadata, preview, download.
#[async_trait::async_trait]
pub trait DocumentGateway: Send + Sync {
    /// List documents visible to the current user, newest first.
    async fn list_documents(&self) -> Result<Vec<Document>, ApiError>;

    /// Fetch a single document record.
    async fn get_document(&self, id: &str) -> Result<Document, ApiError>;

    /// Probe the backend processing status. Always resolves to an outcome
    /// plus a human-readable message and the raw record.
    async fn check_status(&self, id: &str) -> Result<StatusCheck, ApiError>;

    /// Multipart upload (file + title). Returns the created document.
    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: &str,
    ) -> Result<Document, ApiError>;

    /// Fetch the rendered preview for a document.
    async fn preview(&self, id: &str) -> Result<DocumentPreview, ApiError>;

    /// Download the generated output as raw bytes.
    async fn download(&self, id: &str) -> Result<DownloadPayload, ApiError>;
}

/// Analysis resource gateway. Fetch and trigger are separate wire calls;
/// the fetch-or-trigger composition lives in the use case layer.
#[async_trait::async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Fetch an existing analysis. `ApiError::NotFound` means "none yet,
    /// please trigger".
    async fn fetch_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError>;

    /// Trigger creation of a new analysis. `ApiError::Conflict` means
    /// "already exists, please fetch".
    async fn trigger_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError>;
}

/// Chat resource gateway.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a message. The returned exchange is guaranteed non-partial:
    /// if the backend omits either half, the adapter synthesizes a minimal
    /// valid message instead of returning a partial result.
    async fn send_message(
        &self,
        document_id: &str,
        content: &str,
        operation: OperationType,
    ) -> Result<ChatExchange, ApiError>;

    /// Fetch the conversation for a document, ordered oldest-first.
    async fn history(&self, document_id: &str) -> Result<Vec<ChatMessage>, ApiError>;
}

/// Side channel for toast-style user notifications. Fire-and-forget.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
