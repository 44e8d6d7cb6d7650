//! Where schema documents are retrieved from

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::{PublishError, Result};
use crate::gcp::storage::ObjectStore;
use crate::retry::RetryPolicy;

/// Retrieval step of the publish workflow
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Fetch the raw schema document stored under `file_name`
    async fn retrieve(&self, file_name: &str) -> Result<Value>;

    /// Runs after a successful post; most sources have nothing to do
    async fn cleanup(&self, _file_name: &str) -> Result<()> {
        Ok(())
    }
}

/// Raw files from the schema definitions repository on GitHub
#[derive(Debug, Clone)]
pub struct GithubSource {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GithubSource {
    /// `base_url` is the raw-content prefix the file path is appended to
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        }
    }
}

#[async_trait]
impl SchemaSource for GithubSource {
    async fn retrieve(&self, file_name: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, file_name);
        tracing::info!("Fetching schema from {}", url);

        let resp = self
            .retry
            .send(|| self.http.get(&url).send())
            .await
            .map_err(|e| PublishError::Http {
                filepath: file_name.to_string(),
                endpoint: url.clone(),
                source: e,
            })?;

        if resp.status() != StatusCode::OK {
            return Err(PublishError::SchemaFetch {
                filepath: file_name.to_string(),
                status_code: resp.status().as_u16(),
                url,
            });
        }

        resp.json().await.map_err(|_| PublishError::SchemaJsonDecode {
            filepath: file_name.to_string(),
        })
    }
}

/// Schema files dropped into a storage bucket; published files are removed
#[derive(Debug)]
pub struct BucketSource<'a, O> {
    store: &'a O,
    bucket: String,
}

impl<'a, O: ObjectStore> BucketSource<'a, O> {
    pub fn new(store: &'a O, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl<'a, O: ObjectStore> SchemaSource for BucketSource<'a, O> {
    async fn retrieve(&self, file_name: &str) -> Result<Value> {
        self.store.get_json(&self.bucket, file_name).await
    }

    async fn cleanup(&self, file_name: &str) -> Result<()> {
        self.store.delete(&self.bucket, file_name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_github_source_appends_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/main/schemas/068/v1.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"title": "068"})))
            .mount(&server)
            .await;

        let source = GithubSource::new(reqwest::Client::new(), format!("{}/main/", server.uri()));
        let value = source.retrieve("schemas/068/v1.json").await.unwrap();
        assert_eq!(value["title"], "068");
    }

    #[tokio::test]
    async fn test_github_source_reports_fetch_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = format!("{}/main/", server.uri());
        let source = GithubSource::new(reqwest::Client::new(), base.clone());
        let err = source.retrieve("missing.json").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SchemaFetchError);
        assert_eq!(err.filepath(), "missing.json");
        assert_eq!(
            err.message(),
            format!(
                "Failed to fetch schema from GitHub. Status code: 404. URL: {}missing.json",
                base
            )
        );
    }

    #[tokio::test]
    async fn test_github_source_rejects_non_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let source = GithubSource::new(reqwest::Client::new(), format!("{}/", server.uri()));
        let err = source.retrieve("1.json").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaJsonDecodeError);
    }
}
