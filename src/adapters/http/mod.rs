//! HTTP adapters for the document-automation backend.

pub mod chat;
pub mod client;
pub mod documents;
pub mod dto;
pub mod nlp;

pub use chat::HttpChatGateway;
pub use client::HttpClient;
pub use documents::HttpDocumentGateway;
pub use nlp::HttpAnalysisGateway;
