//! Google Cloud collaborators, spoken to over their JSON REST APIs.

pub mod auth;
pub mod pubsub;
pub mod secrets;
pub mod storage;

pub use auth::{MetadataServer, TokenError};
pub use pubsub::PubSubClient;
pub use secrets::SecretManagerClient;
pub use storage::{Bucket, GcsClient, ObjectStore};

use url::Url;

/// Append percent-encoded path segments to a base URL
pub(crate) fn api_url<'s>(
    base_url: &str,
    segments: impl IntoIterator<Item = &'s str>,
) -> Result<Url, String> {
    let mut url = Url::parse(base_url).map_err(|e| format!("invalid URL {}: {}", base_url, e))?;
    url.path_segments_mut()
        .map_err(|_| format!("URL {} cannot take a path", base_url))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
