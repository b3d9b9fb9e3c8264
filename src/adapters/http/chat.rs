//! Chat gateway over the backend's conversation endpoints.

use super::client::HttpClient;
use super::dto::{ChatSendResponse, MessageRecord};
use crate::domain::{ApiError, ChatExchange, ChatMessage, OperationType};
use crate::ports::ChatGateway;
use std::sync::Arc;
use tracing::debug;

pub struct HttpChatGateway {
    client: Arc<HttpClient>,
}

impl HttpChatGateway {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ChatGateway for HttpChatGateway {
    async fn send_message(
        &self,
        document_id: &str,
        content: &str,
        operation: OperationType,
    ) -> Result<ChatExchange, ApiError> {
        let url = self.client.endpoints().chat_messages();
        let body = serde_json::json!({
            "document_id": document_id,
            "content": content,
            "operation_type": operation.as_str(),
        });
        let response = self
            .client
            .execute(|http| http.post(&url).json(&body))
            .await?;

        let parsed: ChatSendResponse =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed chat response: {e}"),
            })?;
        debug!(document_id, operation = operation.as_str(), "chat message sent");
        Ok(parsed.into_exchange(document_id, content))
    }

    async fn history(&self, document_id: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let url = self.client.endpoints().chat_history(document_id);
        let response = self.client.execute(|http| http.get(&url)).await?;
        let records: Vec<MessageRecord> =
            response.json().await.map_err(|e| ApiError::Validation {
                status: 200,
                message: format!("malformed chat history: {e}"),
            })?;

        let mut messages: Vec<ChatMessage> = records
            .into_iter()
            .map(|r| r.into_message(document_id))
            .collect();
        // Oldest first, the order the transcript renders in.
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }
}
