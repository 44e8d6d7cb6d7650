//! Pub/Sub publisher over the REST API
//!
//! `POST /v1/projects/{project}/topics/{topic}:publish` with base64 message data.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::api_url;
use super::auth::MetadataServer;
use crate::error::{PublishError, Result};
use crate::notify::Notifier;
use crate::retry::RetryPolicy;

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes messages to topics of one project
#[derive(Debug)]
pub struct PubSubClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Arc<MetadataServer>,
    retry: RetryPolicy,
}

impl PubSubClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        tokens: Arc<MetadataServer>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            project_id: project_id.into(),
            tokens,
            retry: RetryPolicy::default(),
        }
    }

    /// Fully qualified topic name
    pub fn topic_path(&self, topic_id: &str) -> String {
        format!("projects/{}/topics/{}", self.project_id, topic_id)
    }
}

#[async_trait]
impl Notifier for PubSubClient {
    async fn publish(&self, topic_id: &str, data: &str) -> Result<String> {
        let failure = |detail: String| PublishError::Notification {
            topic: topic_id.to_string(),
            detail,
        };

        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| failure(e.to_string()))?;

        let publish_segment = format!("{}:publish", topic_id);
        let url = api_url(
            &self.base_url,
            ["v1", "projects", self.project_id.as_str(), "topics", publish_segment.as_str()],
        )
        .map_err(failure)?;

        let body = PublishRequest {
            messages: vec![OutgoingMessage {
                data: STANDARD.encode(data.as_bytes()),
            }],
        };

        let resp = self
            .retry
            .send(|| self.http.post(url.clone()).bearer_auth(&token).json(&body).send())
            .await
            .map_err(|e| failure(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(failure(format!("publish returned {}", resp.status().as_u16())));
        }

        let published: PublishResponse = resp.json().await.map_err(|e| failure(e.to_string()))?;
        let message_id = published.message_ids.into_iter().next().unwrap_or_default();
        tracing::info!(message_id = %message_id, "Published message to {}", self.topic_path(topic_id));
        Ok(message_id)
    }
}
