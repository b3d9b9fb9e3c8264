//! Analysis gateway over the backend's NLP endpoint.
//!
//! One endpoint, two actions: `get_analysis` fetches an existing record
//! (404 when none exists yet), `analyze_document` starts a run (409 when a
//! record already exists). Both signals are control flow for the caller.

use super::client::HttpClient;
use super::dto::AnalysisRecord;
use crate::domain::{ApiError, DocumentAnalysis};
use crate::ports::AnalysisGateway;
use std::sync::Arc;
use tracing::debug;

pub struct HttpAnalysisGateway {
    client: Arc<HttpClient>,
}

impl HttpAnalysisGateway {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    async fn analyze(&self, document_id: &str, action: &str) -> Result<DocumentAnalysis, ApiError> {
        let url = self.client.endpoints().analyze();
        let body = serde_json::json!({
            "document_id": document_id,
            "action": action,
        });
        let response = self
            .client
            .execute(|http| http.post(&url).json(&body))
            .await?;

        let record: AnalysisRecord =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed analysis response: {e}"),
            })?;
        debug!(document_id, action, status = ?record.status, "analysis response");
        Ok(record.into_analysis(document_id))
    }
}

#[async_trait::async_trait]
impl AnalysisGateway for HttpAnalysisGateway {
    async fn fetch_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
        self.analyze(document_id, "get_analysis").await
    }

    async fn trigger_analysis(&self, document_id: &str) -> Result<DocumentAnalysis, ApiError> {
        self.analyze(document_id, "analyze_document").await
    }
}
