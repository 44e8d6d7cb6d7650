//! Error types for the schema publisher
//!
//! Every failure carries the file path it pertains to, or [`NOT_APPLICABLE`]
//! when no single schema file is involved (metadata lookups, secrets).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// File path marker for errors that are not tied to a schema file
pub const NOT_APPLICABLE: &str = "N/A";

/// Tag identifying a publish failure, as it appears in notification messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FilepathError,
    SchemaDuplicationError,
    SchemaVersionMismatchError,
    SurveyIdError,
    SchemaVersionError,
    SchemaJsonDecodeError,
    SchemaFetchError,
    SchemaPostError,
    SchemaMetadataError,
    SecretAccessError,
    SecretKeyError,
    HttpError,
    StorageError,
    NotificationError,
    TimeoutError,
}

impl ErrorKind {
    /// Wire name used in the `error_type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::FilepathError => "FilepathError",
            ErrorKind::SchemaDuplicationError => "SchemaDuplicationError",
            ErrorKind::SchemaVersionMismatchError => "SchemaVersionMismatchError",
            ErrorKind::SurveyIdError => "SurveyIdError",
            ErrorKind::SchemaVersionError => "SchemaVersionError",
            ErrorKind::SchemaJsonDecodeError => "SchemaJSONDecodeError",
            ErrorKind::SchemaFetchError => "SchemaFetchError",
            ErrorKind::SchemaPostError => "SchemaPostError",
            ErrorKind::SchemaMetadataError => "SchemaMetadataError",
            ErrorKind::SecretAccessError => "SecretAccessError",
            ErrorKind::SecretKeyError => "SecretKeyError",
            ErrorKind::HttpError => "HttpError",
            ErrorKind::StorageError => "StorageError",
            ErrorKind::NotificationError => "NotificationError",
            ErrorKind::TimeoutError => "TimeoutError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema publish errors
#[derive(Error, Debug)]
pub enum PublishError {
    Filepath { filepath: String },

    SchemaDuplication { filepath: String },

    SchemaVersionMismatch { filepath: String },

    SurveyId { filepath: String },

    SchemaVersion { filepath: String },

    SchemaJsonDecode { filepath: String },

    SchemaFetch {
        filepath: String,
        status_code: u16,
        url: String,
    },

    SchemaPost { filepath: String, status_code: u16 },

    SchemaMetadata { survey_id: String, status_code: u16 },

    SecretAccess { detail: String },

    SecretKey,

    /// Transport failure after the retry policy gave up
    Http {
        filepath: String,
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    Storage { filepath: String, detail: String },

    Notification { topic: String, detail: String },

    /// Run exceeded the configured process timeout
    Timeout { filepath: String, seconds: u64 },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::Filepath { .. } => ErrorKind::FilepathError,
            PublishError::SchemaDuplication { .. } => ErrorKind::SchemaDuplicationError,
            PublishError::SchemaVersionMismatch { .. } => ErrorKind::SchemaVersionMismatchError,
            PublishError::SurveyId { .. } => ErrorKind::SurveyIdError,
            PublishError::SchemaVersion { .. } => ErrorKind::SchemaVersionError,
            PublishError::SchemaJsonDecode { .. } => ErrorKind::SchemaJsonDecodeError,
            PublishError::SchemaFetch { .. } => ErrorKind::SchemaFetchError,
            PublishError::SchemaPost { .. } => ErrorKind::SchemaPostError,
            PublishError::SchemaMetadata { .. } => ErrorKind::SchemaMetadataError,
            PublishError::SecretAccess { .. } => ErrorKind::SecretAccessError,
            PublishError::SecretKey => ErrorKind::SecretKeyError,
            PublishError::Http { .. } => ErrorKind::HttpError,
            PublishError::Storage { .. } => ErrorKind::StorageError,
            PublishError::Notification { .. } => ErrorKind::NotificationError,
            PublishError::Timeout { .. } => ErrorKind::TimeoutError,
        }
    }

    /// Human readable description, without the kind or file path
    pub fn message(&self) -> String {
        match self {
            PublishError::Filepath { .. } => "Failed to split filename from path.".to_string(),
            PublishError::SchemaDuplication { .. } => {
                "Schema version already exists in SDS for new schema.".to_string()
            }
            PublishError::SchemaVersionMismatch { .. } => {
                "Schema version does not match filename.".to_string()
            }
            PublishError::SurveyId { .. } => {
                "Failed to fetch survey_id from schema JSON. Check the schema JSON contains a survey ID."
                    .to_string()
            }
            PublishError::SchemaVersion { .. } => {
                "Failed to fetch schema_version from schema JSON. Check the schema JSON contains a schema version."
                    .to_string()
            }
            PublishError::SchemaJsonDecode { .. } => {
                "Failed to decode the downloaded schema as JSON.".to_string()
            }
            PublishError::SchemaFetch { status_code, url, .. } => format!(
                "Failed to fetch schema from GitHub. Status code: {}. URL: {}",
                status_code, url
            ),
            PublishError::SchemaPost { status_code, .. } => {
                format!("Failed to post schema. Status code: {}", status_code)
            }
            PublishError::SchemaMetadata { survey_id, status_code } => format!(
                "Failed to fetch schema metadata for survey {}. Status code: {}",
                survey_id, status_code
            ),
            PublishError::SecretAccess { .. } => {
                "Failed to access secret version from Google Cloud Secret Manager.".to_string()
            }
            PublishError::SecretKey => "OAuth client ID not found in secret.".to_string(),
            PublishError::Http { endpoint, source, .. } => {
                format!("HTTP request to {} failed: {}", endpoint, source)
            }
            PublishError::Storage { detail, .. } => format!("Object storage error: {}", detail),
            PublishError::Notification { topic, detail } => {
                format!("Failed to publish to topic {}: {}", topic, detail)
            }
            PublishError::Timeout { seconds, .. } => {
                format!("Publish did not finish within {}s.", seconds)
            }
        }
    }

    /// File path the error pertains to, or [`NOT_APPLICABLE`]
    pub fn filepath(&self) -> &str {
        match self {
            PublishError::Filepath { filepath }
            | PublishError::SchemaDuplication { filepath }
            | PublishError::SchemaVersionMismatch { filepath }
            | PublishError::SurveyId { filepath }
            | PublishError::SchemaVersion { filepath }
            | PublishError::SchemaJsonDecode { filepath }
            | PublishError::SchemaFetch { filepath, .. }
            | PublishError::SchemaPost { filepath, .. }
            | PublishError::Http { filepath, .. }
            | PublishError::Storage { filepath, .. }
            | PublishError::Timeout { filepath, .. } => filepath,
            PublishError::SchemaMetadata { .. }
            | PublishError::SecretAccess { .. }
            | PublishError::SecretKey
            | PublishError::Notification { .. } => NOT_APPLICABLE,
        }
    }

    /// Structured form of this error for the error topic
    pub fn to_message(&self) -> ErrorMessage {
        ErrorMessage {
            error_type: self.kind().as_str().to_string(),
            message: self.message(),
            filepath: self.filepath().to_string(),
        }
    }

    /// JSON message content published to the error topic
    pub fn generate_message_content(&self) -> String {
        // Three plain strings always serialize
        serde_json::to_string(&self.to_message()).unwrap_or_default()
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Schema Publish Error - {}: {} Filepath: {}",
            self.kind(),
            self.message(),
            self.filepath()
        )
    }
}

/// Notification payload describing a failed publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_type: String,
    pub message: String,
    pub filepath: String,
}
