//! Notion REST client for page updates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::properties::PropertyMap;
use super::RecordWriter;
use crate::task::{TaskExtraction, UpdateOutcome};

pub const NOTION_API_URL: &str = "https://api.notion.com";
pub const NOTION_VERSION: &str = "2025-09-03";

/// Notion client that patches page properties.
pub struct NotionClient {
    client: Client,
    base_url: String,
    token: String,
    version: String,
    properties: PropertyMap,
}

impl NotionClient {
    /// Create a new Notion client.
    pub fn new(
        base_url: &str,
        token: &str,
        version: &str,
        properties: PropertyMap,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            version: version.to_string(),
            properties,
        })
    }

    fn page_url(&self, page_id: &str) -> String {
        format!(
            "{}/v1/pages/{}",
            self.base_url,
            urlencoding::encode(page_id)
        )
    }
}

#[async_trait]
impl RecordWriter for NotionClient {
    async fn apply_update(&self, record_id: &str, extraction: &TaskExtraction) -> UpdateOutcome {
        let body = self.properties.update_body(extraction);

        let resp = match self
            .client
            .patch(self.page_url(record_id))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .header("Notion-Version", &self.version)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(record_id, "Notion request failed: {}", e);
                return UpdateOutcome::failed(format!("Request failed: {}", e));
            }
        };

        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => format!("<unreadable body: {}>", e),
        };

        if status.is_success() {
            UpdateOutcome::ok(text)
        } else {
            UpdateOutcome::failed(format!("{} - {}", status, text))
        }
    }
}
