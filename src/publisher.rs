//! The publish workflow
//!
//! ```text
//! retrieve -> parse -> validate -> post -> cleanup
//! ```
//!
//! Each step either succeeds or ends the run with its error. A schema is
//! either fully published or not published at all.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PublishError, Result};
use crate::gcp::storage::ObjectStore;
use crate::registry::SchemaRegistry;
use crate::schema::Schema;
use crate::source::{BucketSource, GithubSource, SchemaSource};
use crate::validator::SchemaValidator;

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub survey_id: String,
    pub schema_version: String,
    pub filepath: String,
    /// Body SDS answered the post with (null when it sent none)
    pub response: Value,
}

/// Publishes schemas from one source to one registry
pub struct Publisher<'a, S, R> {
    source: S,
    registry: &'a R,
    validate: bool,
}

/// Publisher reading from the schema definitions repository
pub type GithubPublisher<'a, R> = Publisher<'a, GithubSource, R>;

/// Publisher reading from, and cleaning up, an intake bucket
pub type BucketPublisher<'a, O, R> = Publisher<'a, BucketSource<'a, O>, R>;

impl<'a, S: SchemaSource, R: SchemaRegistry> Publisher<'a, S, R> {
    /// Create a publisher that validates every schema before posting
    pub fn new(source: S, registry: &'a R) -> Self {
        Self {
            source,
            registry,
            validate: true,
        }
    }

    /// Post schemas without the filename and duplicate checks
    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub async fn publish(&self, file_name: &str) -> Result<PublishOutcome> {
        let json = self.source.retrieve(file_name).await?;
        let schema = Schema::from_json(json, Some(file_name))?;

        if self.validate {
            SchemaValidator::new(self.registry).validate(&schema).await?;
        }

        let response = self.registry.post_schema(&schema).await?;
        self.source.cleanup(file_name).await?;

        Ok(PublishOutcome {
            survey_id: schema.survey_id,
            schema_version: schema.schema_version,
            filepath: file_name.to_string(),
            response,
        })
    }
}

/// Run a publish under a deadline, reporting overrun as a timeout for `filepath`
pub async fn within_budget<T, F>(budget: Duration, filepath: &str, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(budget, work)
        .await
        .unwrap_or_else(|_| {
            Err(PublishError::Timeout {
                filepath: filepath.to_string(),
                seconds: budget.as_secs(),
            })
        })
}

impl<'a, O: ObjectStore, R: SchemaRegistry> BucketPublisher<'a, O, R> {
    pub fn from_bucket(store: &'a O, bucket: impl Into<String>, registry: &'a R) -> Self {
        Self::new(BucketSource::new(store, bucket), registry)
    }
}
