//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod intent;

pub use entities::{
    AnalysisStatus, ChatExchange, ChatMessage, Document, DocumentAnalysis, DocumentPreview,
    DocumentStatus, DownloadPayload, MessageId, Notice, NoticeLevel, Sender, StatusCheck,
    StatusOutcome, UploadState,
};
pub use errors::ApiError;
pub use intent::{OperationType, infer_operation_type, wants_analysis_retry};
