//! Secret Manager access for the SDS OAuth client id

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use super::api_url;
use super::auth::MetadataServer;
use crate::error::{PublishError, Result};

#[derive(Debug, Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Debug, Deserialize)]
struct SecretPayload {
    data: String,
}

#[derive(Debug)]
pub struct SecretManagerClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    secret_id: String,
    tokens: Arc<MetadataServer>,
}

fn access_error(detail: impl ToString) -> PublishError {
    PublishError::SecretAccess {
        detail: detail.to_string(),
    }
}

impl SecretManagerClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        secret_id: impl Into<String>,
        tokens: Arc<MetadataServer>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            project_id: project_id.into(),
            secret_id: secret_id.into(),
            tokens,
        }
    }

    /// OAuth client id (`web.client_id`) used as the SDS token audience
    pub async fn get_oauth_client_id(&self) -> Result<String> {
        let secret = self.latest_secret_version().await?;
        let parsed: Value = serde_json::from_str(&secret).map_err(|_| PublishError::SecretKey)?;
        parsed
            .pointer("/web/client_id")
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or(PublishError::SecretKey)
    }

    /// Payload of the latest version of the configured secret
    async fn latest_secret_version(&self) -> Result<String> {
        let token = self.tokens.access_token().await.map_err(access_error)?;
        let url = api_url(
            &self.base_url,
            [
                "v1",
                "projects",
                self.project_id.as_str(),
                "secrets",
                self.secret_id.as_str(),
                "versions",
                "latest:access",
            ],
        )
        .map_err(access_error)?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(access_error)?;
        if !resp.status().is_success() {
            return Err(access_error(format!(
                "secret {} returned {}",
                self.secret_id,
                resp.status().as_u16()
            )));
        }

        let body: AccessSecretVersionResponse = resp.json().await.map_err(access_error)?;
        let bytes = STANDARD.decode(body.payload.data).map_err(access_error)?;
        String::from_utf8(bytes).map_err(access_error)
    }
}
