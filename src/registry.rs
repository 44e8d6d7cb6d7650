//! SDS schema registry client
//!
//! | Method | URL | Operation |
//! |--------|-----|-----------|
//! | GET    | `{sds_url}{get_schema_metadata_url}{survey_id}` | Versions already registered for a survey |
//! | POST   | `{sds_url}{post_schema_url}{survey_id}` | Publish a schema document |
//!
//! A 404 from the metadata endpoint means the survey has never had a schema
//! published; it is not an error.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::PublisherConfig;
use crate::error::{PublishError, Result, NOT_APPLICABLE};
use crate::retry::RetryPolicy;
use crate::schema::Schema;

/// One registered schema version, as listed by the metadata endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub schema_version: String,
    /// Remaining fields (guid, survey_id, schema_location, ...) kept opaque
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Operations the publish workflow needs from a schema registry
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Registered versions for a survey, or `None` when the survey is unknown
    async fn get_schema_metadata(&self, survey_id: &str) -> Result<Option<Vec<SchemaMetadata>>>;

    /// Publish a schema, returning the registry's response body
    async fn post_schema(&self, schema: &Schema) -> Result<Value>;
}

/// HTTP client for SDS
#[derive(Debug, Clone)]
pub struct SdsClient {
    http: reqwest::Client,
    base_url: String,
    metadata_endpoint: String,
    post_endpoint: String,
    retry: RetryPolicy,
}

impl SdsClient {
    /// Create a client from configuration, optionally sending a bearer token on every call
    pub fn new(config: &PublisherConfig, bearer_token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| PublishError::SecretAccess { detail: e.to_string() })?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PublishError::Http {
                filepath: NOT_APPLICABLE.to_string(),
                endpoint: "client_init".to_string(),
                source: e,
            })?;

        Ok(Self {
            http,
            base_url: config.sds_url.clone(),
            metadata_endpoint: config.get_schema_metadata_url.clone(),
            post_endpoint: config.post_schema_url.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl SchemaRegistry for SdsClient {
    async fn get_schema_metadata(&self, survey_id: &str) -> Result<Option<Vec<SchemaMetadata>>> {
        let url = format!("{}{}{}", self.base_url, self.metadata_endpoint, survey_id);
        tracing::debug!(%url, "fetching schema metadata");

        let resp = self
            .retry
            .send(|| self.http.get(&url).send())
            .await
            .map_err(|e| PublishError::Http {
                filepath: NOT_APPLICABLE.to_string(),
                endpoint: url.clone(),
                source: e,
            })?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            status => {
                return Err(PublishError::SchemaMetadata {
                    survey_id: survey_id.to_string(),
                    status_code: status.as_u16(),
                })
            }
        }

        resp.json()
            .await
            .map(Some)
            .map_err(|_| PublishError::SchemaJsonDecode {
                filepath: NOT_APPLICABLE.to_string(),
            })
    }

    async fn post_schema(&self, schema: &Schema) -> Result<Value> {
        tracing::info!("Posting schema for survey {}", schema.survey_id);
        let url = format!("{}{}{}", self.base_url, self.post_endpoint, schema.survey_id);

        let resp = self
            .retry
            .send(|| self.http.post(&url).json(&schema.json).send())
            .await
            .map_err(|e| PublishError::Http {
                filepath: schema.filepath_or_na().to_string(),
                endpoint: url.clone(),
                source: e,
            })?;

        if resp.status() != StatusCode::OK {
            return Err(PublishError::SchemaPost {
                filepath: schema.filepath_or_na().to_string(),
                status_code: resp.status().as_u16(),
            });
        }

        tracing::info!(
            "Schema {} posted for survey {}",
            schema.filepath_or_na(),
            schema.survey_id
        );

        let body = resp.text().await.map_err(|e| PublishError::Http {
            filepath: schema.filepath_or_na().to_string(),
            endpoint: url.clone(),
            source: e,
        })?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keeps_unknown_fields() {
        let record: SchemaMetadata = serde_json::from_value(serde_json::json!({
            "guid": "a2a3",
            "schema_version": "v1",
            "survey_id": "068"
        }))
        .unwrap();
        assert_eq!(record.schema_version, "v1");
        assert_eq!(record.extra["guid"], "a2a3");
    }

    #[test]
    fn test_metadata_requires_version() {
        let result = serde_json::from_value::<SchemaMetadata>(serde_json::json!({"guid": "a2a3"}));
        assert!(result.is_err());
    }
}
