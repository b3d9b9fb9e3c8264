//! Document gateway over the backend's REST API.

use super::client::HttpClient;
use super::dto::{DocumentRecord, PreviewRecord};
use crate::domain::{ApiError, Document, DocumentPreview, DownloadPayload, StatusCheck};
use crate::ports::DocumentGateway;
use std::sync::Arc;
use tracing::{debug, info};

pub struct HttpDocumentGateway {
    client: Arc<HttpClient>,
}

impl HttpDocumentGateway {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    async fn fetch_record(&self, id: &str) -> Result<DocumentRecord, ApiError> {
        let url = self.client.endpoints().document(id);
        let response = self.client.execute(|http| http.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed document response: {e}"),
            })
    }
}

#[async_trait::async_trait]
impl DocumentGateway for HttpDocumentGateway {
    async fn list_documents(&self) -> Result<Vec<Document>, ApiError> {
        let url = self.client.endpoints().documents();
        let response = self.client.execute(|http| http.get(&url)).await?;
        let records: Vec<DocumentRecord> =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed document list: {e}"),
            })?;
        debug!(count = records.len(), "listed documents");
        Ok(records.into_iter().map(DocumentRecord::into_document).collect())
    }

    async fn get_document(&self, id: &str) -> Result<Document, ApiError> {
        Ok(self.fetch_record(id).await?.into_document())
    }

    /// The backend exposes processing state on the document resource itself,
    /// so the status probe is a plain fetch plus local derivation.
    async fn check_status(&self, id: &str) -> Result<StatusCheck, ApiError> {
        Ok(self.fetch_record(id).await?.into_status_check())
    }

    async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        title: &str,
    ) -> Result<Document, ApiError> {
        let url = self.client.endpoints().upload();
        let file_name = file_name.to_string();
        let title = title.to_string();
        let timeout = self.client.upload_timeout();

        // The multipart form is rebuilt per attempt because a form cannot
        // be reused once attached to a request.
        let response = self
            .client
            .execute(move |http| {
                let part = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone());
                let form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("title", title.clone());
                http.post(&url).multipart(form).timeout(timeout)
            })
            .await?;

        let record: DocumentRecord =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed upload response: {e}"),
            })?;
        info!(document_id = %record.id, "uploaded document");
        Ok(record.into_document())
    }

    async fn preview(&self, id: &str) -> Result<DocumentPreview, ApiError> {
        let url = self.client.endpoints().preview(id);
        let response = self.client.execute(|http| http.get(&url)).await?;
        let record: PreviewRecord =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed preview response: {e}"),
            })?;
        Ok(record.into_preview())
    }

    async fn download(&self, id: &str) -> Result<DownloadPayload, ApiError> {
        let url = self.client.endpoints().download(id);
        let response = self.client.execute(|http| http.get(&url)).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_disposition_filename)
            .unwrap_or_else(|| format!("document-{id}.bin"));

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read download body: {e}")))?
            .to_vec();
        info!(document_id = id, size = bytes.len(), "downloaded document");

        Ok(DownloadPayload {
            bytes,
            content_type,
            file_name,
        })
    }
}

/// Extract the filename from a Content-Disposition header, tolerating both
/// quoted and bare forms.
fn parse_disposition_filename(header: &str) -> Option<String> {
    let name = header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?
        .trim_matches('"')
        .trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_filename_parses_quoted_and_bare() {
        assert_eq!(
            parse_disposition_filename(r#"attachment; filename="report.pdf""#),
            Some("report.pdf".to_string())
        );
        assert_eq!(
            parse_disposition_filename("attachment; filename=report.pdf"),
            Some("report.pdf".to_string())
        );
        assert_eq!(parse_disposition_filename("attachment"), None);
        assert_eq!(parse_disposition_filename(r#"attachment; filename="""#), None);
    }
}
