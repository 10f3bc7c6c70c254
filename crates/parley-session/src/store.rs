//! Conversation persistence collaborator

use async_trait::async_trait;
use parley_wire::client::join_url;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A conversation as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub updated_at: i64,
}

/// Backend that persists conversation metadata
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list(&self) -> Result<Vec<ConversationSummary>>;

    async fn rename(&self, id: &str, title: &str) -> Result<()>;

    /// Soft-delete: the backend keeps the row and flags it
    async fn delete(&self, id: &str) -> Result<()>;

    async fn set_visibility(&self, id: &str, is_public: bool) -> Result<()>;

    async fn set_hidden(&self, id: &str, is_hidden: bool) -> Result<()>;
}

/// [`ConversationStore`] over the backend's REST API
#[derive(Debug, Clone)]
pub struct HttpConversationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpConversationStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn conversation_url(&self, id: &str) -> String {
        join_url(
            &self.base_url,
            &format!("/api/conversations/{}", urlencoding::encode(id)),
        )
    }

    async fn patch(&self, id: &str, body: serde_json::Value) -> Result<()> {
        let url = self.conversation_url(id);
        tracing::debug!("PATCH {} {}", url, body);
        let response = self
            .client
            .patch(&url)
            .json(&body)
            .send()
            .await
            .map_err(parley_wire::Error::from)?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(parley_wire::Error::status(status.as_u16(), body).into())
}

fn parse_conversations(body: &str) -> Result<Vec<ConversationSummary>> {
    let conversations = serde_json::from_str(body).map_err(parley_wire::Error::from)?;
    Ok(conversations)
}

#[async_trait]
impl ConversationStore for HttpConversationStore {
    async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let url = join_url(&self.base_url, "/api/conversations");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(parley_wire::Error::from)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parley_wire::Error::status(status.as_u16(), body).into());
        }
        let body = response.text().await.map_err(parley_wire::Error::from)?;
        parse_conversations(&body)
    }

    async fn rename(&self, id: &str, title: &str) -> Result<()> {
        self.patch(id, serde_json::json!({ "title": title })).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = self.conversation_url(id);
        tracing::debug!("DELETE {}", url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(parley_wire::Error::from)?;
        check_status(response).await
    }

    async fn set_visibility(&self, id: &str, is_public: bool) -> Result<()> {
        self.patch(id, serde_json::json!({ "isPublic": is_public }))
            .await
    }

    async fn set_hidden(&self, id: &str, is_hidden: bool) -> Result<()> {
        self.patch(id, serde_json::json!({ "isHidden": is_hidden }))
            .await
    }
}
