//! Credentials from the GCE metadata server.
//!
//! Access tokens authorise calls to Google APIs (storage, pub/sub, secret
//! manager). Identity tokens carry an audience and authenticate calls through
//! the SDS load balancer.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

const TOKEN_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/token";
const IDENTITY_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/identity";

/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("metadata server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("metadata server returned {0}")]
    Status(u16),
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Client for the metadata server's service account endpoints
#[derive(Debug)]
pub struct MetadataServer {
    http: reqwest::Client,
    base_url: String,
    access_token: Mutex<Option<CachedToken>>,
}

impl MetadataServer {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: Mutex::new(None),
        }
    }

    /// OAuth2 access token for Google APIs, cached until shortly before expiry
    pub async fn access_token(&self) -> Result<String, TokenError> {
        if let Some(token) = self.cached_access_token() {
            tracing::debug!("using cached access token");
            return Ok(token);
        }

        let url = format!("{}/{}", self.base_url, TOKEN_PATH);
        let resp = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TokenError::Status(resp.status().as_u16()));
        }
        let body: AccessTokenResponse = resp.json().await?;

        let cached = CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in - EXPIRY_MARGIN_SECS),
        };
        if let Ok(mut slot) = self.access_token.lock() {
            *slot = Some(cached.clone());
        }
        Ok(cached.token)
    }

    /// OIDC identity token whose audience is `audience`
    pub async fn identity_token(&self, audience: &str) -> Result<String, TokenError> {
        let url = format!("{}/{}", self.base_url, IDENTITY_PATH);
        let resp = self
            .http
            .get(&url)
            .query(&[("audience", audience), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(TokenError::Status(resp.status().as_u16()));
        }
        Ok(resp.text().await?.trim().to_string())
    }

    fn cached_access_token(&self) -> Option<String> {
        let slot = self.access_token.lock().ok()?;
        slot.as_ref()
            .filter(|cached| cached.expires_at > Utc::now())
            .map(|cached| cached.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_access_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", TOKEN_PATH)))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.token",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let metadata = MetadataServer::new(reqwest::Client::new(), server.uri());
        assert_eq!(metadata.access_token().await.unwrap(), "ya29.token");
        assert_eq!(metadata.access_token().await.unwrap(), "ya29.token");
    }

    #[tokio::test]
    async fn test_identity_token_passes_audience() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{}", IDENTITY_PATH)))
            .and(query_param("audience", "client-123.apps.googleusercontent.com"))
            .respond_with(ResponseTemplate::new(200).set_body_string("eyJhbGciOi.id.token\n"))
            .mount(&server)
            .await;

        let metadata = MetadataServer::new(reqwest::Client::new(), server.uri());
        let token = metadata
            .identity_token("client-123.apps.googleusercontent.com")
            .await
            .unwrap();
        assert_eq!(token, "eyJhbGciOi.id.token");
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let metadata = MetadataServer::new(reqwest::Client::new(), server.uri());
        assert!(matches!(
            metadata.access_token().await,
            Err(TokenError::Status(403))
        ));
    }
}
