//! Success and failure notifications for publish runs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PublishError, Result};
use crate::publisher::PublishOutcome;

/// Destination for notification messages
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Publish `data` to a topic, returning the message id
    async fn publish(&self, topic_id: &str, data: &str) -> Result<String>;
}

/// Payload sent to the success topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessMessage {
    pub survey_id: String,
    pub schema_version: String,
    pub filepath: String,
}

impl From<&PublishOutcome> for SuccessMessage {
    fn from(outcome: &PublishOutcome) -> Self {
        Self {
            survey_id: outcome.survey_id.clone(),
            schema_version: outcome.schema_version.clone(),
            filepath: outcome.filepath.clone(),
        }
    }
}

/// Routes outcomes to the configured success and error topics
#[derive(Debug)]
pub struct NotificationService<'a, N> {
    notifier: &'a N,
    success_topic: String,
    error_topic: String,
}

impl<'a, N: Notifier> NotificationService<'a, N> {
    pub fn new(notifier: &'a N, success_topic: impl Into<String>, error_topic: impl Into<String>) -> Self {
        Self {
            notifier,
            success_topic: success_topic.into(),
            error_topic: error_topic.into(),
        }
    }

    pub async fn notify_success(&self, outcome: &PublishOutcome) -> Result<String> {
        let content = serde_json::to_string(&SuccessMessage::from(outcome)).map_err(|e| {
            PublishError::Notification {
                topic: self.success_topic.clone(),
                detail: e.to_string(),
            }
        })?;
        self.notifier.publish(&self.success_topic, &content).await
    }

    pub async fn notify_error(&self, error: &PublishError) -> Result<String> {
        self.notifier
            .publish(&self.error_topic, &error.generate_message_content())
            .await
    }
}
