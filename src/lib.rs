//! SDS Schema Publisher
//!
//! Retrieves survey JSON schemas, checks them against the SDS schema registry
//! and publishes them, reporting each outcome on pub/sub.
//!
//! ## Features
//!
//! - **Swappable sources**: schemas come from the schema definitions
//!   repository on GitHub or from an intake storage bucket
//! - **Version checks**: the file name must match the declared version, and
//!   the version must not already be registered for the survey
//! - **Typed failures**: every error carries a kind, a message and the file it
//!   concerns, and serializes straight onto the error topic
//!
//! ## Workflow
//!
//! ```text
//! SchemaSource::retrieve(file)
//!   └─ Schema::from_json            properties.survey_id.enum[0]
//!        │                          properties.schema_version.const
//!        └─ SchemaValidator::validate
//!             ├─ file stem == schema_version
//!             └─ GET  {sds}/v1/schema_metadata?survey_id=..   (404 = new survey)
//!                  └─ SchemaRegistry::post_schema
//!                       └─ POST {sds}/v1/schema?survey_id=..
//!                            └─ SchemaSource::cleanup   (bucket source deletes the file)
//! ```

pub mod config;
pub mod error;
pub mod gcp;
pub mod notify;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod source;
pub mod validator;

pub use config::PublisherConfig;
pub use error::{ErrorKind, ErrorMessage, PublishError, Result};
pub use notify::{NotificationService, Notifier};
pub use publisher::{within_budget, BucketPublisher, GithubPublisher, PublishOutcome, Publisher};
pub use registry::{SchemaMetadata, SchemaRegistry, SdsClient};
pub use retry::RetryPolicy;
pub use schema::Schema;
pub use source::{BucketSource, GithubSource, SchemaSource};
pub use validator::SchemaValidator;
