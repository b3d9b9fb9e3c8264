//! Mock backend for running the client without a server.
//!
//! Implements all three gateways over an in-memory store with canned
//! responses and a configurable simulated latency. Exercises the same
//! control-flow signals as the real backend: 404 from analysis fetch when
//! no record exists, 409 from trigger when one already does.

use crate::domain::{
    AnalysisStatus, ApiError, ChatExchange, ChatMessage, Document, DocumentAnalysis,
    DocumentPreview, DocumentStatus, DownloadPayload, MessageId, OperationType, Sender,
    StatusCheck, StatusOutcome,
};
use crate::ports::{AnalysisGateway, ChatGateway, DocumentGateway};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

#[derive(Default)]
struct MockState {
    documents: HashMap<String, Document>,
    previews: HashMap<String, DocumentPreview>,
    analyses: HashMap<String, DocumentAnalysis>,
    transcripts: HashMap<String, Vec<ChatMessage>>,
}

/// In-memory stand-in for the document backend.
pub struct MockBackend {
    state: Mutex<MockState>,
    next_id: AtomicU64,
    delay_ms: u64,
}

impl MockBackend {
    /// Backend pre-seeded with a couple of sample documents.
    pub fn new(delay_ms: u64) -> Self {
        let backend = Self {
            state: Mutex::new(MockState::default()),
            next_id: AtomicU64::new(1),
            delay_ms,
        };
        backend.seed("Quarterly Report.docx", "report");
        backend.seed("Service Agreement.pdf", "contract");
        backend
    }

    /// Empty backend for tests.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            next_id: AtomicU64::new(1),
            delay_ms: 0,
        }
    }

    fn seed(&self, name: &str, file_type: &str) {
        let id = self.allocate_id();
        let document = Document {
            id: id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
            status: DocumentStatus::Ready,
            file_type: file_type.to_string(),
        };
        let mut state = self.lock();
        state.previews.insert(id.clone(), Self::canned_preview(&id, name));
        state.documents.insert(id, document);
    }

    fn allocate_id(&self) -> String {
        format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn canned_preview(id: &str, name: &str) -> DocumentPreview {
        DocumentPreview {
            id: id.to_string(),
            content: format!(
                "<h1>{name}</h1><p>[MOCK] This preview is generated locally. \
                 Edits requested through chat would be reflected here by a real \
                 backend.</p>"
            ),
            mime_type: "text/html".to_string(),
            version: 1,
            last_updated: Utc::now(),
        }
    }

    fn canned_analysis(&self, document_id: &str) -> DocumentAnalysis {
        let mut entities = BTreeMap::new();
        entities.insert(
            "organizations".to_string(),
            vec!["Acme Corp".to_string(), "Globex".to_string()],
        );
        entities.insert("dates".to_string(), vec!["2026-01-15".to_string()]);
        DocumentAnalysis {
            id: self.allocate_id(),
            document_id: document_id.to_string(),
            summary: "[MOCK] This document covers a commercial engagement between two \
                      parties, including delivery milestones, payment terms, and \
                      termination conditions."
                .to_string(),
            keywords: vec![
                "agreement".to_string(),
                "milestones".to_string(),
                "payment".to_string(),
            ],
            sentiment: "neutral".to_string(),
            entities,
            topics: vec!["Contract terms".to_string(), "Deliverables".to_string()],
            status: AnalysisStatus::Completed,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn message(
        &self,
        document_id: &str,
        content: String,
        sender: Sender,
    ) -> ChatMessage {
        ChatMessage {
            id: MessageId::Confirmed(self.allocate_id()),
            document_id: document_id.to_string(),
            content,
            sender,
            timestamp: Utc::now(),
        }
    }

    fn canned_reply(&self, content: &str, operation: OperationType) -> String {
        match operation {
            OperationType::Summarize => {
                "[MOCK] Summary: the document describes a standard commercial \
                 agreement with defined milestones and payment terms."
                    .to_string()
            }
            OperationType::Simplify => {
                "[MOCK] In plain terms: one side delivers work in stages, the \
                 other pays on acceptance, and either can exit with notice."
                    .to_string()
            }
            OperationType::Extract => {
                "[MOCK] Extracted items:\n- Deliver phase 1 by Q2\n- Invoice on \
                 acceptance\n- 30-day termination notice"
                    .to_string()
            }
            _ => format!(
                "[MOCK] I received your request ({}): \"{content}\". A real \
                 backend would act on the document here.",
                operation.as_str()
            ),
        }
    }
}

#[async_trait::async_trait]
impl DocumentGateway for MockBackend {
    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        self.simulate_latency().await;
        let state = self.lock();
        let mut documents: Vec<Document> = state.documents.values().cloned().collect();
        documents.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(documents)
    }

    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        self.simulate_latency().await;
        self.lock()
            .documents
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no document {id}")))
    }

    async fn check_status(&self, id: &str) -> Result<StatusCheck, ApiError> {
        let document = self.get_document(id).await?;
        let (outcome, message) = match document.status {
            DocumentStatus::Ready => (StatusOutcome::Success, "Document is ready.".to_string()),
            DocumentStatus::Processing => (
                StatusOutcome::Pending,
                "Document is still being processed.".to_string(),
            ),
            DocumentStatus::Failed => (
                StatusOutcome::Error,
                "Document processing failed.".to_string(),
            ),
        };
        Ok(StatusCheck {
            outcome,
            message,
            document,
        })
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: &str,
    ) -> Result<Document, ApiError> {
        self.simulate_latency().await;
        info!(file_name, size = bytes.len(), "[MOCK] accepting upload");

        let id = self.allocate_id();
        let name = if title.is_empty() { file_name } else { title };
        let document = Document {
            id: id.clone(),
            name: name.to_string(),
            created_at: Utc::now(),
            status: DocumentStatus::Ready,
            file_type: file_name
                .rsplit('.')
                .next()
                .unwrap_or("other")
                .to_string(),
        };

        let mut state = self.lock();
        state
            .previews
            .insert(id.clone(), Self::canned_preview(&id, name));
        state.documents.insert(id, document.clone());
        Ok(document)
    }

    async fn preview(&self, id: &str) -> Result<DocumentPreview, ApiError> {
        self.simulate_latency().await;
        self.lock()
            .previews
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no preview for document {id}")))
    }

    async fn download(&self, id: &str) -> Result<DownloadPayload, ApiError> {
        self.simulate_latency().await;
        let state = self.lock();
        let document = state
            .documents
            .get(id)
            .ok_or_else(|| ApiError::NotFound(format!("no document {id}")))?;
        let preview = state.previews.get(id);
        Ok(DownloadPayload {
            bytes: preview
                .map(|p| p.content.clone().into_bytes())
                .unwrap_or_default(),
            content_type: "text/html".to_string(),
            file_name: format!("{}.html", document.name),
        })
    }
}

#[async_trait::async_trait]
impl AnalysisGateway for MockBackend {
    async fn fetch_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
        self.simulate_latency().await;
        self.lock()
            .analyses
            .get(document_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("no analysis for document {document_id}")))
    }

    async fn trigger_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
        self.simulate_latency().await;
        info!(document_id, "[MOCK] running analysis");

        let analysis = self.canned_analysis(document_id);

        // Check-and-insert under one lock so concurrent triggers cannot
        // both pass the existence check.
        let mut state = self.lock();
        if !state.documents.contains_key(document_id) {
            return Err(ApiError::NotFound(format!("no document {document_id}")));
        }
        if state.analyses.contains_key(document_id) {
            return Err(ApiError::Conflict(format!(
                "analysis already exists for document {document_id}"
            )));
        }
        state
            .analyses
            .insert(document_id.to_string(), analysis.clone());
        Ok(analysis)
    }
}

#[async_trait::async_trait]
impl ChatGateway for MockBackend {
    async fn send_message(
        &self,
        document_id: &str,
        content: &str,
        operation: OperationType,
    ) -> Result<ChatExchange, ApiError> {
        self.simulate_latency().await;
        if !self.lock().documents.contains_key(document_id) {
            return Err(ApiError::NotFound(format!("no document {document_id}")));
        }

        let user_message = self.message(document_id, content.to_string(), Sender::User);
        let assistant_message = self.message(
            document_id,
            self.canned_reply(content, operation),
            Sender::Assistant,
        );

        let mut state = self.lock();
        let transcript = state.transcripts.entry(document_id.to_string()).or_default();
        transcript.push(user_message.clone());
        transcript.push(assistant_message.clone());

        Ok(ChatExchange {
            user_message,
            assistant_message,
        })
    }

    async fn history(&self, document_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        self.simulate_latency().await;
        Ok(self
            .lock()
            .transcripts
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }
}
