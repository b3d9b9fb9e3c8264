//! Session controller: owns the state for the currently active document and
//! reconciles the three independently fetched backend resources (document
//! status, analysis, chat) into one consistent view.
//!
//! - All mutation goes through `Shared::mutate` (read-modify-write of the
//!   whole structure under one lock, never held across an await)
//! - Every mutation publishes a fresh snapshot on a watch channel; UI code
//!   reads snapshots only and never touches the state directly
//! - `is_loading` is tied to a drop guard, so no error path can leave it
//!   stuck true
//! - Async resolutions commit via `commit_if_current`: results for a
//!   document that is no longer current are discarded (stale-write guard)

use crate::domain::{
    AnalysisStatus, ApiError, ChatExchange, ChatMessage, Document, DocumentAnalysis,
    DocumentPreview, DownloadPayload, MessageId, Notice, Sender, StatusOutcome, UploadState,
    infer_operation_type, wants_analysis_retry,
};
use crate::ports::{AnalysisGateway, ChatGateway, DocumentGateway, Notifier};
use crate::usecases::retry::RetryPolicy;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Second bracketing message when a chat-initiated analysis retry ends with
/// a completed analysis.
pub const ANALYSIS_RETRY_DONE: &str =
    "Analysis refreshed. Ask me anything about the updated insights.";
/// Second bracketing message when the retry did not produce a completed
/// analysis.
pub const ANALYSIS_RETRY_FAILED: &str =
    "The analysis could not be refreshed. You can keep chatting, but insights may be limited.";
/// Inline assistant apology appended when a chat send exhausts its retries.
pub const CHAT_SEND_APOLOGY: &str =
    "Sorry, I couldn't process that message right now. Please try again in a moment.";

/// Read-only view handed to presentation code.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub current_document: Option<Document>,
    pub document_preview: Option<DocumentPreview>,
    pub document_analysis: Option<DocumentAnalysis>,
    pub chat_messages: Vec<ChatMessage>,
    pub upload: Option<UploadState>,
    pub is_loading: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    current_document: Option<Document>,
    preview: Option<DocumentPreview>,
    analysis: Option<DocumentAnalysis>,
    transcript: Vec<ChatMessage>,
    upload: Option<UploadState>,
    in_flight: usize,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_document: self.current_document.clone(),
            document_preview: self.preview.clone(),
            document_analysis: self.analysis.clone(),
            chat_messages: self.transcript.clone(),
            upload: self.upload.clone(),
            is_loading: self.in_flight > 0,
        }
    }

    /// Remove the optimistic entry with this temp id. Ids are unique per
    /// send, so this removes at most one message.
    fn remove_pending(&mut self, temp_id: &str) {
        self.transcript
            .retain(|m| m.id != MessageId::Pending(temp_id.to_string()));
    }

    /// Resolve an optimistic entry locally (no server counterpart), keeping
    /// it in the transcript as a confirmed message.
    fn resolve_pending_local(&mut self, temp_id: &str) {
        for message in &mut self.transcript {
            if message.id == MessageId::Pending(temp_id.to_string()) {
                message.id = MessageId::Confirmed(temp_id.to_string());
            }
        }
    }
}

/// State plus the update channel. Split out so drop guards can reach both.
struct Shared {
    state: Mutex<SessionState>,
    updates: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut state);
        self.updates.send_replace(state.snapshot());
        result
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

/// Scoped busy marker. `is_loading` stays true while any of these is alive
/// and resets when the last one drops, on success and failure paths alike.
struct BusyGuard {
    shared: Arc<Shared>,
}

impl BusyGuard {
    fn acquire(shared: &Arc<Shared>) -> Self {
        shared.mutate(|s| s.in_flight += 1);
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.shared.mutate(|s| s.in_flight = s.in_flight.saturating_sub(1));
    }
}

/// What to commit when an analysis fetch exhausts its retries.
enum AnalysisDegrade {
    /// Limited placeholder so chat stays usable (initial load on select).
    Limited,
    /// Failed placeholder with the error message (explicit refresh).
    Failed,
}

/// The document session controller. Constructed once per session and passed
/// by reference to consumers; there is no ambient global.
pub struct SessionController {
    documents: Arc<dyn DocumentGateway>,
    analysis: Arc<dyn AnalysisGateway>,
    chat: Arc<dyn ChatGateway>,
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
    shared: Arc<Shared>,
    temp_seq: AtomicU64,
}

impl SessionController {
    pub fn new(
        documents: Arc<dyn DocumentGateway>,
        analysis: Arc<dyn AnalysisGateway>,
        chat: Arc<dyn ChatGateway>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        let state = SessionState::default();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            documents,
            analysis,
            chat,
            notifier,
            retry,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                updates,
            }),
            temp_seq: AtomicU64::new(0),
        }
    }

    /// Current read-only view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.read(SessionState::snapshot)
    }

    /// Subscribe to snapshot updates. Every committed mutation publishes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Make `document` the current document. Clears all dependent state
    /// first, then runs three concurrent, individually guarded loads:
    /// chat history, preview and analysis. A failure in one load never
    /// blocks the other two.
    pub async fn select_document(&self, document: Document) {
        let _busy = BusyGuard::acquire(&self.shared);
        let doc_id = document.id.clone();
        info!(document_id = %doc_id, name = %document.name, "selecting document");

        self.shared.mutate(|s| {
            s.transcript.clear();
            s.preview = None;
            s.analysis = None;
            s.upload = None;
            s.current_document = Some(document);
        });

        let history = async {
            match self
                .retry
                .run("chat history", || self.chat.history(&doc_id))
                .await
            {
                Ok(messages) => {
                    self.commit_if_current(&doc_id, |s| s.transcript = messages);
                }
                Err(e) => {
                    warn!(document_id = %doc_id, error = %e, "chat history load failed");
                    self.notifier.notify(Notice::warning(
                        "Chat history",
                        "Failed to load the conversation for this document.",
                    ));
                }
            }
        };

        let preview = async {
            match self
                .retry
                .run("preview", || self.documents.preview(&doc_id))
                .await
            {
                Ok(preview) => {
                    self.commit_if_current(&doc_id, |s| s.preview = Some(preview));
                }
                Err(e) => {
                    warn!(document_id = %doc_id, error = %e, "preview load failed");
                    self.notifier.notify(Notice::warning(
                        "Preview",
                        "Failed to load the document preview.",
                    ));
                }
            }
        };

        let analysis = self.refresh_analysis_for(&doc_id, AnalysisDegrade::Limited);

        tokio::join!(history, preview, analysis);
    }

    /// Drop the current document and all dependent state.
    pub async fn clear_document(&self) {
        self.shared.mutate(|s| {
            s.current_document = None;
            s.preview = None;
            s.analysis = None;
            s.transcript.clear();
            s.upload = None;
        });
    }

    /// Send a chat message about the current document.
    ///
    /// Appends an optimistic user message immediately, reconciles it with
    /// the server pair on success and replaces it with an inline apology on
    /// failure. "Retry analysis" intents are routed to the analysis refresh
    /// instead of the chat backend. Errors are absorbed here; the caller
    /// only sees the exchange (or nothing).
    pub async fn send_message(&self, text: &str) -> Option<ChatExchange> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let Some(document) = self.shared.read(|s| s.current_document.clone()) else {
            self.notifier.notify(Notice::warning(
                "No document",
                "Upload or select a document before chatting.",
            ));
            return None;
        };
        let doc_id = document.id.clone();
        let _busy = BusyGuard::acquire(&self.shared);

        let temp_id = self.next_temp_id();
        let optimistic = ChatMessage {
            id: MessageId::Pending(temp_id.clone()),
            document_id: doc_id.clone(),
            content: text.to_string(),
            sender: Sender::User,
            timestamp: Utc::now(),
        };
        self.shared.mutate(|s| s.transcript.push(optimistic));

        if wants_analysis_retry(text) {
            self.commit_if_current(&doc_id, |s| {
                s.resolve_pending_local(&temp_id);
                s.transcript.push(ChatMessage::system(
                    &doc_id,
                    "Re-running the document analysis now.",
                ));
            });

            self.refresh_analysis_for(&doc_id, AnalysisDegrade::Failed)
                .await;

            let completed = self.shared.read(|s| {
                matches!(
                    s.analysis.as_ref().map(|a| a.status),
                    Some(AnalysisStatus::Completed)
                )
            });
            let outcome = if completed {
                ANALYSIS_RETRY_DONE
            } else {
                ANALYSIS_RETRY_FAILED
            };
            self.commit_if_current(&doc_id, |s| {
                s.transcript.push(ChatMessage::system(&doc_id, outcome));
            });
            return None;
        }

        // Downstream operation inference and the UI both assume an analysis
        // is attached; degrade to the limited placeholder when none is.
        if self.shared.read(|s| s.analysis.is_none()) {
            debug!(document_id = %doc_id, "no analysis attached, inserting fallback before send");
            self.commit_if_current(&doc_id, |s| {
                s.analysis = Some(DocumentAnalysis::fallback(&doc_id));
            });
        }

        let operation = infer_operation_type(text);
        let result = self
            .retry
            .run("chat send", || {
                self.chat.send_message(&doc_id, text, operation)
            })
            .await;

        let outcome = match result {
            Ok(exchange) => {
                let committed = self.commit_if_current(&doc_id, |s| {
                    s.remove_pending(&temp_id);
                    s.transcript.push(exchange.user_message.clone());
                    s.transcript.push(exchange.assistant_message.clone());
                });
                if committed {
                    info!(document_id = %doc_id, operation = operation.as_str(), "chat exchange committed");
                    Some(exchange)
                } else {
                    None
                }
            }
            Err(e) => {
                warn!(document_id = %doc_id, error = %e, "chat send failed after retries");
                self.commit_if_current(&doc_id, |s| {
                    s.remove_pending(&temp_id);
                    s.transcript
                        .push(ChatMessage::assistant_local(&doc_id, CHAT_SEND_APOLOGY));
                });
                self.notifier.notify(Notice::error(
                    "Message failed",
                    "The message could not be delivered. Please try again.",
                ));
                None
            }
        };

        // The message may have transformed the document. Refresh the
        // preview; on failure keep whatever preview we had.
        self.refresh_preview_quiet(&doc_id).await;

        outcome
    }

    /// Re-run the analysis for the current document, gated on processing
    /// status. Degrades to a failed placeholder after retry exhaustion.
    pub async fn refresh_analysis(&self) {
        let Some(doc_id) = self.shared.read(|s| s.current_document.as_ref().map(|d| d.id.clone()))
        else {
            return;
        };
        let _busy = BusyGuard::acquire(&self.shared);
        self.refresh_analysis_for(&doc_id, AnalysisDegrade::Failed)
            .await;
    }

    /// Refetch the preview for the current document. The previous preview
    /// is kept when the refresh fails.
    pub async fn refresh_preview(&self) {
        let Some(doc_id) = self.shared.read(|s| s.current_document.as_ref().map(|d| d.id.clone()))
        else {
            return;
        };
        let _busy = BusyGuard::acquire(&self.shared);
        match self
            .retry
            .run("preview", || self.documents.preview(&doc_id))
            .await
        {
            Ok(preview) => {
                self.commit_if_current(&doc_id, |s| s.preview = Some(preview));
            }
            Err(e) => {
                warn!(document_id = %doc_id, error = %e, "preview refresh failed, keeping previous");
                self.notifier.notify(Notice::warning(
                    "Preview",
                    "Failed to refresh the document preview.",
                ));
            }
        }
    }

    /// Upload a file and make the created document current.
    pub async fn upload_document(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: &str,
    ) -> Result<Document, ApiError> {
        let _busy = BusyGuard::acquire(&self.shared);
        info!(file_name, size = bytes.len(), "uploading document");
        self.shared
            .mutate(|s| s.upload = Some(UploadState::started()));

        match self.documents.upload(file_name, bytes, title).await {
            Ok(document) => {
                self.shared.mutate(|s| {
                    s.upload = Some(UploadState {
                        uploading: false,
                        progress: 100,
                        error: None,
                    });
                });
                // Selecting discards the finished upload state.
                self.select_document(document.clone()).await;
                Ok(document)
            }
            Err(e) => {
                self.shared.mutate(|s| {
                    s.upload = Some(UploadState {
                        uploading: false,
                        progress: 0,
                        error: Some(e.to_string()),
                    });
                });
                self.notifier
                    .notify(Notice::error("Upload failed", e.to_string()));
                Err(e)
            }
        }
    }

    /// Download the generated output for the current document.
    pub async fn download_document(&self) -> Result<DownloadPayload, ApiError> {
        let Some(doc_id) = self.shared.read(|s| s.current_document.as_ref().map(|d| d.id.clone()))
        else {
            return Err(ApiError::NotFound("no document selected".into()));
        };
        let _busy = BusyGuard::acquire(&self.shared);
        self.retry
            .run("download", || self.documents.download(&doc_id))
            .await
    }

    /// List documents available on the backend (for the picker UI).
    pub async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let _busy = BusyGuard::acquire(&self.shared);
        self.retry
            .run("document list", || self.documents.list_documents())
            .await
    }

    /// Status-gated fetch-or-trigger. Aborts with a notification when the
    /// document is still processing or failed processing; in both cases the
    /// analysis slot is left untouched (stays absent when it was absent).
    /// Transient faults anywhere in the pipeline, the status probe included,
    /// degrade to a placeholder after retry exhaustion.
    async fn refresh_analysis_for(&self, doc_id: &str, degrade: AnalysisDegrade) {
        let check = match self
            .retry
            .run("status check", || self.documents.check_status(doc_id))
            .await
        {
            Ok(check) => check,
            Err(e) => {
                warn!(document_id = %doc_id, error = %e, "status check failed after retries");
                self.commit_degraded(doc_id, degrade, &e);
                return;
            }
        };

        match check.outcome {
            StatusOutcome::Error => {
                warn!(document_id = %doc_id, message = %check.message, "document processing failed");
                self.notifier
                    .notify(Notice::error("Document processing failed", check.message));
                return;
            }
            StatusOutcome::Pending => {
                info!(document_id = %doc_id, "document still processing, analysis deferred");
                self.notifier.notify(Notice::info(
                    "Analysis",
                    "The document is still being processed. Try again in a moment.",
                ));
                return;
            }
            StatusOutcome::Success | StatusOutcome::Warning => {}
        }

        match self
            .retry
            .run("analysis", || self.fetch_or_trigger(doc_id))
            .await
        {
            Ok(analysis) => {
                let status = analysis.status;
                if self.commit_if_current(doc_id, |s| s.analysis = Some(analysis)) {
                    info!(document_id = %doc_id, status = ?status, "analysis committed");
                }
            }
            Err(e) => {
                warn!(document_id = %doc_id, error = %e, "analysis unavailable after retries");
                self.commit_degraded(doc_id, degrade, &e);
            }
        }
    }

    /// Commit the degrade placeholder for an exhausted analysis load and
    /// raise a non-fatal notice. Chat stays usable either way.
    fn commit_degraded(&self, doc_id: &str, degrade: AnalysisDegrade, error: &ApiError) {
        let placeholder = match degrade {
            AnalysisDegrade::Limited => DocumentAnalysis::fallback(doc_id),
            AnalysisDegrade::Failed => DocumentAnalysis::failed(doc_id, &error.to_string()),
        };
        self.commit_if_current(doc_id, |s| s.analysis = Some(placeholder));
        self.notifier.notify(Notice::warning(
            "Analysis unavailable",
            "AI analysis could not be produced. Chat stays available with limited insights.",
        ));
    }

    /// One logical fetch: existing analysis, or trigger creation when none
    /// exists. "Already exists" from either step is treated as success and
    /// resolved by re-fetching, so the operation is idempotent for callers.
    async fn fetch_or_trigger(&self, doc_id: &str) -> Result<DocumentAnalysis, ApiError> {
        match self.analysis.fetch_analysis(doc_id).await {
            Ok(analysis) => Ok(analysis),
            Err(ApiError::Conflict(_)) => self.analysis.fetch_analysis(doc_id).await,
            Err(ApiError::NotFound(_)) => {
                debug!(document_id = %doc_id, "no analysis yet, triggering creation");
                match self.analysis.trigger_analysis(doc_id).await {
                    Ok(analysis) => Ok(analysis),
                    Err(ApiError::Conflict(_)) => self.analysis.fetch_analysis(doc_id).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Post-send preview refresh. Failures are logged and swallowed: the
    /// previous preview stays in place.
    async fn refresh_preview_quiet(&self, doc_id: &str) {
        match self.documents.preview(doc_id).await {
            Ok(preview) => {
                self.commit_if_current(doc_id, |s| s.preview = Some(preview));
            }
            Err(e) => {
                debug!(document_id = %doc_id, error = %e, "post-send preview refresh failed");
            }
        }
    }

    /// Apply a mutation only when `doc_id` is still the current document.
    /// Returns false (and commits nothing) for stale resolutions.
    fn commit_if_current(&self, doc_id: &str, f: impl FnOnce(&mut SessionState)) -> bool {
        self.shared.mutate(|s| {
            let current = s
                .current_document
                .as_ref()
                .is_some_and(|d| d.id == doc_id);
            if current {
                f(s);
            } else {
                debug!(document_id = %doc_id, "discarding stale result for replaced document");
            }
            current
        })
    }

    /// Unique per call even when two sends land in the same millisecond.
    fn next_temp_id(&self) -> String {
        format!(
            "temp-{}-{}",
            Utc::now().timestamp_millis(),
            self.temp_seq.fetch_add(1, Ordering::Relaxed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DocumentStatus, NoticeLevel, OperationType, StatusCheck};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{id}.pdf"),
            created_at: Utc::now(),
            status: DocumentStatus::Ready,
            file_type: "pdf".to_string(),
        }
    }

    fn completed_analysis(doc_id: &str) -> DocumentAnalysis {
        DocumentAnalysis {
            id: format!("analysis-{doc_id}"),
            document_id: doc_id.to_string(),
            summary: "A contract between two parties.".to_string(),
            keywords: vec!["contract".to_string()],
            sentiment: "neutral".to_string(),
            entities: Default::default(),
            topics: vec!["agreements".to_string()],
            status: AnalysisStatus::Completed,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn sample_preview(doc_id: &str) -> DocumentPreview {
        DocumentPreview {
            id: format!("preview-{doc_id}"),
            content: "<p>preview</p>".to_string(),
            mime_type: "text/html".to_string(),
            version: 1,
            last_updated: Utc::now(),
        }
    }

    fn exchange(doc_id: &str, text: &str) -> ChatExchange {
        ChatExchange {
            user_message: ChatMessage {
                id: MessageId::Confirmed(format!("u-{text}")),
                document_id: doc_id.to_string(),
                content: text.to_string(),
                sender: Sender::User,
                timestamp: Utc::now(),
            },
            assistant_message: ChatMessage {
                id: MessageId::Confirmed(format!("a-{text}")),
                document_id: doc_id.to_string(),
                content: format!("Re: {text}"),
                sender: Sender::Assistant,
                timestamp: Utc::now(),
            },
        }
    }

    fn status_check(doc_id: &str, outcome: StatusOutcome) -> StatusCheck {
        StatusCheck {
            outcome,
            message: match outcome {
                StatusOutcome::Success => "Document is ready.".to_string(),
                StatusOutcome::Pending => "Document is still being processed.".to_string(),
                StatusOutcome::Error => "Document processing failed.".to_string(),
                StatusOutcome::Warning => "Document processed with warnings.".to_string(),
            },
            document: doc(doc_id),
        }
    }

    /// Scripted backend: queues of canned results per endpoint, with benign
    /// defaults where a test does not care.
    #[derive(Default)]
    struct ScriptedBackend {
        fetch_results: StdMutex<VecDeque<Result<DocumentAnalysis, ApiError>>>,
        trigger_results: StdMutex<VecDeque<Result<DocumentAnalysis, ApiError>>>,
        send_results: StdMutex<VecDeque<Result<ChatExchange, ApiError>>>,
        history_results: StdMutex<VecDeque<Result<Vec<ChatMessage>, ApiError>>>,
        status_results: StdMutex<VecDeque<Result<StatusCheck, ApiError>>>,
        preview_results: StdMutex<VecDeque<Result<DocumentPreview, ApiError>>>,
        fetch_calls: AtomicUsize,
        trigger_calls: AtomicUsize,
        send_calls: AtomicUsize,
        status_calls: AtomicUsize,
        sent_operations: StdMutex<Vec<OperationType>>,
        send_gate: StdMutex<Option<Arc<Notify>>>,
        list_gate: StdMutex<Option<Arc<Notify>>>,
    }

    impl ScriptedBackend {
        fn script_fetch(&self, result: Result<DocumentAnalysis, ApiError>) {
            self.fetch_results.lock().unwrap().push_back(result);
        }
        fn script_trigger(&self, result: Result<DocumentAnalysis, ApiError>) {
            self.trigger_results.lock().unwrap().push_back(result);
        }
        fn script_send(&self, result: Result<ChatExchange, ApiError>) {
            self.send_results.lock().unwrap().push_back(result);
        }
        fn script_status(&self, result: Result<StatusCheck, ApiError>) {
            self.status_results.lock().unwrap().push_back(result);
        }
        fn script_history(&self, result: Result<Vec<ChatMessage>, ApiError>) {
            self.history_results.lock().unwrap().push_back(result);
        }
        fn gate_sends(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.send_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }
        fn gate_lists(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }
    }

    #[async_trait::async_trait]
    impl DocumentGateway for ScriptedBackend {
        async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
            let gate = self.list_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(vec![doc("listed")])
        }

        async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
            Ok(doc(id))
        }

        async fn check_status(&self, id: &str) -> Result<StatusCheck, ApiError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(status_check(id, StatusOutcome::Success)))
        }

        async fn upload(
            &self,
            _file_name: &str,
            _bytes: Vec<u8>,
            title: &str,
        ) -> Result<Document, ApiError> {
            Ok(doc(title))
        }

        async fn preview(&self, id: &str) -> Result<DocumentPreview, ApiError> {
            self.preview_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(sample_preview(id)))
        }

        async fn download(&self, _id: &str) -> Result<DownloadPayload, ApiError> {
            Ok(DownloadPayload {
                bytes: b"pdf".to_vec(),
                content_type: "application/pdf".to_string(),
                file_name: "out.pdf".to_string(),
            })
        }
    }

    #[async_trait::async_trait]
    impl AnalysisGateway for ScriptedBackend {
        async fn fetch_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.fetch_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(completed_analysis(document_id)))
        }

        async fn trigger_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
            self.trigger_calls.fetch_add(1, Ordering::SeqCst);
            self.trigger_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(completed_analysis(document_id)))
        }
    }

    #[async_trait::async_trait]
    impl ChatGateway for ScriptedBackend {
        async fn send_message(
            &self,
            document_id: &str,
            content: &str,
            operation: OperationType,
        ) -> Result<ChatExchange, ApiError> {
            let gate = self.send_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            self.sent_operations.lock().unwrap().push(operation);
            self.send_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(exchange(document_id, content)))
        }

        async fn history(&self, _document_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
            self.history_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: StdMutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn notices(&self) -> Vec<Notice> {
            self.notices.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    fn controller(
        backend: &Arc<ScriptedBackend>,
        notifier: &Arc<RecordingNotifier>,
    ) -> SessionController {
        SessionController::new(
            Arc::clone(backend) as Arc<dyn DocumentGateway>,
            Arc::clone(backend) as Arc<dyn AnalysisGateway>,
            Arc::clone(backend) as Arc<dyn ChatGateway>,
            Arc::clone(notifier) as Arc<dyn Notifier>,
            RetryPolicy::immediate(2),
        )
    }

    fn network_err() -> ApiError {
        ApiError::Network("connection refused".into())
    }

    #[tokio::test]
    async fn select_document_clears_previous_session() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);

        backend.script_history(Ok(vec![ChatMessage::system("a", "old turn")]));
        session.select_document(doc("a")).await;
        assert_eq!(session.snapshot().chat_messages.len(), 1);
        assert!(session.snapshot().document_preview.is_some());

        // Every load for document b fails; nothing from a may leak through.
        for _ in 0..3 {
            backend.script_history(Err(network_err()));
            backend.preview_results.lock().unwrap().push_back(Err(network_err()));
            backend.script_fetch(Err(network_err()));
        }
        session.select_document(doc("b")).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.current_document.as_ref().unwrap().id, "b");
        assert!(snapshot.chat_messages.is_empty());
        assert!(snapshot.document_preview.is_none());
        // Analysis degrades to the limited fallback on the select path.
        assert_eq!(
            snapshot.document_analysis.unwrap().status,
            AnalysisStatus::Limited
        );
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn send_message_commits_exactly_one_confirmed_pair() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;

        let response = session.send_message("Hello there").await;
        assert!(response.is_some());

        let snapshot = session.snapshot();
        assert!(snapshot.chat_messages.iter().all(|m| !m.id.is_pending()));
        let user_turns: Vec<_> = snapshot
            .chat_messages
            .iter()
            .filter(|m| m.sender == Sender::User && m.content == "Hello there")
            .collect();
        assert_eq!(user_turns.len(), 1, "placeholder must be replaced, not duplicated");
        assert_eq!(snapshot.chat_messages.len(), 2);
        assert_eq!(snapshot.chat_messages[1].sender, Sender::Assistant);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn failed_send_replaces_placeholder_with_apology() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;

        for _ in 0..3 {
            backend.script_send(Err(network_err()));
        }
        let response = session.send_message("Hello?").await;
        assert!(response.is_none());

        let snapshot = session.snapshot();
        assert!(snapshot.chat_messages.iter().all(|m| !m.id.is_pending()));
        assert_eq!(snapshot.chat_messages.len(), 1);
        assert_eq!(snapshot.chat_messages[0].sender, Sender::Assistant);
        assert_eq!(snapshot.chat_messages[0].content, CHAT_SEND_APOLOGY);
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 3);
        assert!(notifier.notices().iter().any(|n| n.title == "Message failed"));
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn analysis_fetch_trigger_conflict_resolves_idempotently() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;
        backend.fetch_calls.store(0, Ordering::SeqCst);
        backend.trigger_calls.store(0, Ordering::SeqCst);

        // 404 -> trigger -> 409 -> re-fetch -> completed.
        backend.script_fetch(Err(ApiError::NotFound("no analysis".into())));
        backend.script_trigger(Err(ApiError::Conflict("already exists".into())));
        backend.script_fetch(Ok(completed_analysis("a")));
        session.refresh_analysis().await;

        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.document_analysis.as_ref().unwrap().status,
            AnalysisStatus::Completed
        );
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 1);

        // Second refresh finds the existing analysis; one analysis, no
        // user-visible error either time.
        session.refresh_analysis().await;
        assert_eq!(
            session.snapshot().document_analysis.unwrap().status,
            AnalysisStatus::Completed
        );
        assert!(
            notifier
                .notices()
                .iter()
                .all(|n| n.level != NoticeLevel::Error)
        );
    }

    #[tokio::test]
    async fn analysis_retry_exhaustion_commits_failed_placeholder() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;
        backend.fetch_calls.store(0, Ordering::SeqCst);

        for _ in 0..3 {
            backend.script_fetch(Err(network_err()));
        }
        session.refresh_analysis().await;

        let snapshot = session.snapshot();
        let analysis = snapshot.document_analysis.unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert!(!analysis.summary.is_empty());
        assert!(analysis.error_message.as_deref().is_some_and(|m| !m.is_empty()));
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 3);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn select_status_check_failure_degrades_to_limited_fallback() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);

        // The status probe itself is flaky; the analysis slot must still end
        // up with the limited fallback, not stay empty.
        for _ in 0..3 {
            backend.script_status(Err(network_err()));
        }
        session.select_document(doc("a")).await;

        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.document_analysis.unwrap().status,
            AnalysisStatus::Limited
        );
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 3);
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
        assert!(
            notifier
                .notices()
                .iter()
                .any(|n| n.level == NoticeLevel::Warning && n.title == "Analysis unavailable")
        );
        assert!(
            notifier
                .notices()
                .iter()
                .all(|n| n.level != NoticeLevel::Error)
        );
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn refresh_status_check_failure_commits_failed_placeholder() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;

        for _ in 0..3 {
            backend.script_status(Err(network_err()));
        }
        session.refresh_analysis().await;

        let analysis = session.snapshot().document_analysis.unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert!(analysis.error_message.as_deref().is_some_and(|m| !m.is_empty()));
    }

    #[tokio::test]
    async fn pending_document_defers_analysis_and_stays_absent() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);

        // Both the select-time load and the explicit refresh see a document
        // that is still processing.
        backend.script_status(Ok(status_check("contract", StatusOutcome::Pending)));
        backend.script_status(Ok(status_check("contract", StatusOutcome::Pending)));
        session.select_document(doc("contract")).await;
        session.refresh_analysis().await;

        let snapshot = session.snapshot();
        assert!(snapshot.document_analysis.is_none());
        assert_eq!(backend.fetch_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.trigger_calls.load(Ordering::SeqCst), 0);
        assert!(
            notifier
                .notices()
                .iter()
                .any(|n| n.message.contains("Try again in a moment"))
        );
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn failed_processing_aborts_analysis_with_error_notice() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        backend.script_status(Ok(status_check("a", StatusOutcome::Pending)));
        session.select_document(doc("a")).await;

        backend.script_status(Ok(status_check("a", StatusOutcome::Error)));
        session.refresh_analysis().await;

        assert!(session.snapshot().document_analysis.is_none());
        assert!(
            notifier
                .notices()
                .iter()
                .any(|n| n.level == NoticeLevel::Error && n.title == "Document processing failed")
        );
    }

    #[tokio::test]
    async fn summarize_without_analysis_attaches_fallback_first() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);

        // Analysis stays absent after select (document still processing).
        backend.script_status(Ok(status_check("a", StatusOutcome::Pending)));
        session.select_document(doc("a")).await;
        assert!(session.snapshot().document_analysis.is_none());

        session.send_message("Please summarize this document").await;

        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.document_analysis.unwrap().status,
            AnalysisStatus::Limited
        );
        assert_eq!(
            backend.sent_operations.lock().unwrap().as_slice(),
            &[OperationType::Summarize]
        );
    }

    #[tokio::test]
    async fn retry_analysis_intent_brackets_with_system_messages() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;

        let response = session.send_message("retry analysis").await;
        assert!(response.is_none());
        assert_eq!(backend.send_calls.load(Ordering::SeqCst), 0);

        let snapshot = session.snapshot();
        let system: Vec<_> = snapshot
            .chat_messages
            .iter()
            .filter(|m| m.sender == Sender::System)
            .collect();
        assert_eq!(system.len(), 2);
        assert_eq!(system[1].content, ANALYSIS_RETRY_DONE);
        // The user's turn stays in the transcript, resolved locally.
        assert!(
            snapshot
                .chat_messages
                .iter()
                .any(|m| m.sender == Sender::User && !m.id.is_pending())
        );
    }

    #[tokio::test]
    async fn retry_analysis_outcome_message_reflects_failure() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;

        for _ in 0..3 {
            backend.script_fetch(Err(network_err()));
        }
        session.send_message("please analyze again").await;

        let snapshot = session.snapshot();
        let last_system = snapshot
            .chat_messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::System)
            .unwrap();
        assert_eq!(last_system.content, ANALYSIS_RETRY_FAILED);
        assert_ne!(ANALYSIS_RETRY_FAILED, ANALYSIS_RETRY_DONE);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn stale_send_resolution_is_discarded_after_document_switch() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(controller(&backend, &notifier));
        session.select_document(doc("a")).await;

        let gate = backend.gate_sends();
        let in_flight = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.send_message("for document a").await })
        };
        // Let the send task park on the gate, then switch documents.
        tokio::task::yield_now().await;
        session.select_document(doc("b")).await;
        gate.notify_one();
        let response = in_flight.await.unwrap();

        assert!(response.is_none(), "stale exchange must not be reported");
        let snapshot = session.snapshot();
        assert_eq!(snapshot.current_document.as_ref().unwrap().id, "b");
        assert!(
            snapshot
                .chat_messages
                .iter()
                .all(|m| m.document_id != "a"),
            "no message for the replaced document may be committed"
        );
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn preview_refresh_failure_keeps_previous_preview() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        session.select_document(doc("a")).await;
        let before = session.snapshot().document_preview;
        assert!(before.is_some());

        for _ in 0..3 {
            backend.preview_results.lock().unwrap().push_back(Err(network_err()));
        }
        session.refresh_preview().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.document_preview, before);
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn upload_selects_created_document_and_clears_upload_state() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);

        let created = session
            .upload_document("contract.pdf", b"bytes".to_vec(), "contract")
            .await
            .unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.current_document.as_ref().unwrap().id, created.id);
        assert!(snapshot.upload.is_none());
        assert!(!snapshot.is_loading);
    }

    #[tokio::test]
    async fn list_documents_reports_busy_while_in_flight() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(controller(&backend, &notifier));

        let gate = backend.gate_lists();
        let in_flight = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.list_documents().await })
        };
        tokio::task::yield_now().await;
        assert!(session.snapshot().is_loading);

        gate.notify_one();
        let listed = in_flight.await.unwrap().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!session.snapshot().is_loading);
    }

    #[tokio::test]
    async fn snapshot_subscription_observes_commits() {
        let backend = Arc::new(ScriptedBackend::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = controller(&backend, &notifier);
        let mut updates = session.subscribe();

        session.select_document(doc("a")).await;
        updates.changed().await.unwrap();
        assert_eq!(
            updates.borrow().current_document.as_ref().unwrap().id,
            "a"
        );
    }
}
