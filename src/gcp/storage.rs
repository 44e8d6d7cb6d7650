//! Object storage for schema files
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/storage/v1/b/{bucket}` | Bucket lookup (cached) |
//! | GET    | `/storage/v1/b/{bucket}/o/{object}?alt=media` | Download object |
//! | DELETE | `/storage/v1/b/{bucket}/o/{object}` | Delete object |
//! | POST   | `/upload/storage/v1/b/{bucket}/o?uploadType=media&name={object}` | Upload object |

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use super::api_url;
use super::auth::MetadataServer;
use crate::config::PublisherConfig;
use crate::error::{PublishError, Result, NOT_APPLICABLE};
use crate::retry::RetryPolicy;

/// Buckets the publisher works with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Where SDS keeps published schemas
    Schema,
    /// Intake bucket schemas are published from
    SchemaPublish,
}

impl Bucket {
    /// Configured bucket name
    pub fn name<'a>(&self, config: &'a PublisherConfig) -> &'a str {
        match self {
            Bucket::Schema => &config.schema_bucket_name,
            Bucket::SchemaPublish => &config.schema_publish_bucket_name,
        }
    }
}

/// Object operations needed by the publisher
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download an object and parse it as JSON
    async fn get_json(&self, bucket: &str, name: &str) -> Result<Value>;

    async fn delete(&self, bucket: &str, name: &str) -> Result<()>;

    /// Upload a local file under its file name, returning the object name
    async fn upload(&self, bucket: &str, local_path: &Path) -> Result<String>;
}

/// Bucket resource as returned by the storage API
#[derive(Debug, Clone, Deserialize)]
pub struct BucketHandle {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Google Cloud Storage JSON API client
#[derive(Debug)]
pub struct GcsClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<MetadataServer>,
    buckets: Mutex<HashMap<String, BucketHandle>>,
    retry: RetryPolicy,
}

fn storage_error(filepath: &str, detail: impl Into<String>) -> PublishError {
    PublishError::Storage {
        filepath: filepath.to_string(),
        detail: detail.into(),
    }
}

impl GcsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: Arc<MetadataServer>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            tokens,
            buckets: Mutex::new(HashMap::new()),
            retry: RetryPolicy::default(),
        }
    }

    /// Look up a bucket, fetching it from the API on first use only
    pub async fn fetch_bucket(&self, bucket: &str) -> Result<BucketHandle> {
        if let Some(handle) = self.cached_bucket(bucket) {
            tracing::debug!(bucket, "bucket handle cache hit");
            return Ok(handle);
        }

        let url = api_url(&self.base_url, ["storage", "v1", "b", bucket])
            .map_err(|e| storage_error(NOT_APPLICABLE, e))?;
        let resp = self.send(|token| self.http.get(url.clone()).bearer_auth(token), NOT_APPLICABLE).await?;

        match resp.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(storage_error(NOT_APPLICABLE, format!("Bucket {} not found", bucket)))
            }
            status => {
                return Err(storage_error(
                    NOT_APPLICABLE,
                    format!("bucket lookup for {} returned {}", bucket, status.as_u16()),
                ))
            }
        }

        let handle: BucketHandle = resp
            .json()
            .await
            .map_err(|e| storage_error(NOT_APPLICABLE, e.to_string()))?;
        if let Ok(mut buckets) = self.buckets.lock() {
            buckets.insert(bucket.to_string(), handle.clone());
        }
        Ok(handle)
    }

    fn cached_bucket(&self, bucket: &str) -> Option<BucketHandle> {
        self.buckets.lock().ok()?.get(bucket).cloned()
    }

    async fn send<F>(&self, build: F, filepath: &str) -> Result<reqwest::Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| storage_error(filepath, e.to_string()))?;

        self.retry
            .send(|| build(token.as_str()).send())
            .await
            .map_err(|e| PublishError::Http {
                filepath: filepath.to_string(),
                endpoint: e.url().map(|u| u.to_string()).unwrap_or_default(),
                source: e,
            })
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn get_json(&self, bucket: &str, name: &str) -> Result<Value> {
        let handle = self.fetch_bucket(bucket).await?;
        tracing::info!("Retrieving {} from bucket {}", name, handle.name);

        let mut url = api_url(&self.base_url, ["storage", "v1", "b", handle.name.as_str(), "o", name])
            .map_err(|e| storage_error(name, e))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let resp = self.send(|token| self.http.get(url.clone()).bearer_auth(token), name).await?;
        if !resp.status().is_success() {
            return Err(storage_error(
                name,
                format!("download from {} returned {}", handle.name, resp.status().as_u16()),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| storage_error(name, e.to_string()))?;
        serde_json::from_slice(&body).map_err(|_| PublishError::SchemaJsonDecode {
            filepath: name.to_string(),
        })
    }

    async fn delete(&self, bucket: &str, name: &str) -> Result<()> {
        let handle = self.fetch_bucket(bucket).await?;
        let url = api_url(&self.base_url, ["storage", "v1", "b", handle.name.as_str(), "o", name])
            .map_err(|e| storage_error(name, e))?;

        let resp = self.send(|token| self.http.delete(url.clone()).bearer_auth(token), name).await?;
        if !resp.status().is_success() {
            return Err(storage_error(
                name,
                format!("delete from {} returned {}", handle.name, resp.status().as_u16()),
            ));
        }
        tracing::info!("Deleted {} from bucket {}", name, handle.name);
        Ok(())
    }

    async fn upload(&self, bucket: &str, local_path: &Path) -> Result<String> {
        let display = local_path.display().to_string();
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PublishError::Filepath { filepath: display.clone() })?
            .to_string();
        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| storage_error(&display, e.to_string()))?;

        let handle = self.fetch_bucket(bucket).await?;
        let mut url = api_url(&self.base_url, ["upload", "storage", "v1", "b", handle.name.as_str(), "o"])
            .map_err(|e| storage_error(&display, e))?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &name);

        let resp = self
            .send(
                |token| {
                    self.http
                        .post(url.clone())
                        .bearer_auth(token)
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(content.clone())
                },
                &display,
            )
            .await?;
        if !resp.status().is_success() {
            return Err(storage_error(
                &display,
                format!("upload to {} returned {}", handle.name, resp.status().as_u16()),
            ));
        }
        tracing::info!("Uploaded {} to bucket {}", name, handle.name);
        Ok(name)
    }
}
