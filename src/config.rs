//! Configuration management for the schema publisher
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (publisher.toml)
//! - Environment variables (`SDS_URL`, `SCHEMA_BUCKET_NAME`, ...)
//!
//! Environment variables carry no prefix so the names used by the existing
//! cloud function deployments keep working.
//!
//! ## Example config file (publisher.toml):
//! ```toml
//! project_id = "ons-sds-dev"
//! sds_url = "https://sds.dev.example"
//! schema_publish_bucket_name = "ons-sds-dev-schema-publish"
//! process_timeout = 300
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Publisher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// GCP project hosting the buckets, topics and secret
    #[serde(default = "default_project_id")]
    pub project_id: String,

    /// Budget for one publish run, in seconds
    #[serde(default = "default_process_timeout")]
    pub process_timeout: u64,

    /// SDS base URL
    #[serde(default = "default_sds_url")]
    pub sds_url: String,

    /// Secret holding the OAuth client used as the SDS token audience
    #[serde(default = "default_secret_id")]
    pub secret_id: String,

    /// Prefix for raw schema files in the schema definitions repository
    #[serde(default = "default_github_schema_url")]
    pub github_schema_url: String,

    /// SDS path for posting a schema, survey id appended
    #[serde(default = "default_post_schema_url")]
    pub post_schema_url: String,

    /// SDS path for schema metadata, survey id appended
    #[serde(default = "default_get_schema_metadata_url")]
    pub get_schema_metadata_url: String,

    #[serde(default = "default_error_topic")]
    pub publish_schema_error_topic_id: String,

    #[serde(default = "default_success_topic")]
    pub publish_schema_success_topic_id: String,

    #[serde(default = "default_queue_topic")]
    pub publish_schema_queue_topic_id: String,

    #[serde(default = "default_firestore_db_name")]
    pub firestore_db_name: String,

    /// Bucket SDS stores published schemas in
    #[serde(default = "default_schema_bucket_name")]
    pub schema_bucket_name: String,

    /// Intake bucket schemas are published from
    #[serde(default = "default_schema_publish_bucket_name")]
    pub schema_publish_bucket_name: String,

    /// Attach an identity token to SDS requests
    #[serde(default = "default_true")]
    pub authenticate: bool,

    #[serde(default = "default_storage_url")]
    pub storage_url: String,

    #[serde(default = "default_pubsub_url")]
    pub pubsub_url: String,

    #[serde(default = "default_secret_manager_url")]
    pub secret_manager_url: String,

    /// GCE metadata server, source of access and identity tokens
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
}

// Default value functions
fn default_project_id() -> String {
    "ons-sds-jb".to_string()
}

fn default_process_timeout() -> u64 {
    540
}

fn default_sds_url() -> String {
    "test_url".to_string()
}

fn default_secret_id() -> String {
    "oauth-client-id".to_string()
}

fn default_github_schema_url() -> String {
    "https://raw.githubusercontent.com/ONSdigital/sds-schema-definitions/main/".to_string()
}

fn default_post_schema_url() -> String {
    "/v1/schema?survey_id=".to_string()
}

fn default_get_schema_metadata_url() -> String {
    "/v1/schema_metadata?survey_id=".to_string()
}

fn default_error_topic() -> String {
    "publish-schema-error".to_string()
}

fn default_success_topic() -> String {
    "publish-schema-success".to_string()
}

fn default_queue_topic() -> String {
    "publish-schema-queue".to_string()
}

fn default_firestore_db_name() -> String {
    "ons-sds-jb-sds".to_string()
}

fn default_schema_bucket_name() -> String {
    "ons-sds-jb-sds-europe-west2-schema".to_string()
}

fn default_schema_publish_bucket_name() -> String {
    "ons-sds-jb-sds-europe-west2-schema-publish".to_string()
}

fn default_true() -> bool {
    true
}

fn default_storage_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_pubsub_url() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_secret_manager_url() -> String {
    "https://secretmanager.googleapis.com".to_string()
}

fn default_metadata_url() -> String {
    "http://metadata.google.internal".to_string()
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            process_timeout: default_process_timeout(),
            sds_url: default_sds_url(),
            secret_id: default_secret_id(),
            github_schema_url: default_github_schema_url(),
            post_schema_url: default_post_schema_url(),
            get_schema_metadata_url: default_get_schema_metadata_url(),
            publish_schema_error_topic_id: default_error_topic(),
            publish_schema_success_topic_id: default_success_topic(),
            publish_schema_queue_topic_id: default_queue_topic(),
            firestore_db_name: default_firestore_db_name(),
            schema_bucket_name: default_schema_bucket_name(),
            schema_publish_bucket_name: default_schema_publish_bucket_name(),
            authenticate: true,
            storage_url: default_storage_url(),
            pubsub_url: default_pubsub_url(),
            secret_manager_url: default_secret_manager_url(),
            metadata_url: default_metadata_url(),
        }
    }
}

impl PublisherConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "publisher.toml",
            ".publisher.toml",
            "config/publisher.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("uk.gov", "ons", "sds-publisher") {
            let xdg_config = config_dir.config_dir().join("publisher.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Unprefixed, e.g. SDS_URL -> sds_url
        builder = builder.add_source(Environment::default().try_parsing(true));

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn process_budget(&self) -> Duration {
        Duration::from_secs(self.process_timeout)
    }

    /// Full SDS URL for fetching a survey's schema metadata
    pub fn schema_metadata_url(&self, survey_id: &str) -> String {
        format!("{}{}{}", self.sds_url, self.get_schema_metadata_url, survey_id)
    }

    /// Full SDS URL for posting a survey's schema
    pub fn post_schema_url_for(&self, survey_id: &str) -> String {
        format!("{}{}{}", self.sds_url, self.post_schema_url, survey_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    #[test]
    fn test_default_config() {
        let config = PublisherConfig::default();
        assert_eq!(config.process_timeout, 540);
        assert_eq!(config.post_schema_url, "/v1/schema?survey_id=");
        assert!(config.authenticate);
    }

    #[test]
    fn test_registry_urls_concatenate() {
        let config = PublisherConfig {
            sds_url: "https://sds.example".to_string(),
            ..PublisherConfig::default()
        };
        assert_eq!(
            config.schema_metadata_url("068"),
            "https://sds.example/v1/schema_metadata?survey_id=068"
        );
        assert_eq!(
            config.post_schema_url_for("068"),
            "https://sds.example/v1/schema?survey_id=068"
        );
    }

    #[test]
    fn test_serialize_config() {
        let config = PublisherConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("sds_url = \"test_url\""));
        assert!(toml_str.contains("process_timeout = 540"));
    }

    // Process environment is shared by every test thread
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 6] = [
        "SDS_URL",
        "PROCESS_TIMEOUT",
        "AUTHENTICATE",
        "SCHEMA_PUBLISH_BUCKET_NAME",
        "POST_SCHEMA_URL",
        "GITHUB_SCHEMA_URL",
    ];

    /// Holds the env lock with the config variables cleared, restoring them on drop
    struct ScopedEnv {
        saved: Vec<(&'static str, Option<String>)>,
        _lock: MutexGuard<'static, ()>,
    }

    impl ScopedEnv {
        fn clean() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let saved = ENV_KEYS
                .iter()
                .map(|key| (*key, std::env::var(key).ok()))
                .collect();
            for key in ENV_KEYS {
                std::env::remove_var(key);
            }
            Self { saved, _lock: lock }
        }

        fn set(&self, key: &str, value: &str) {
            std::env::set_var(key, value);
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                match value {
                    Some(value) => std::env::set_var(key, value),
                    None => std::env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let env = ScopedEnv::clean();
        env.set("SDS_URL", "https://sds.env");
        env.set("PROCESS_TIMEOUT", "30");
        env.set("AUTHENTICATE", "false");

        let config = PublisherConfig::load().unwrap();
        assert_eq!(config.sds_url, "https://sds.env");
        assert_eq!(config.process_budget(), Duration::from_secs(30));
        assert!(!config.authenticate);
        assert_eq!(config.post_schema_url, default_post_schema_url());
    }

    #[test]
    fn test_environment_overrides_file() {
        let env = ScopedEnv::clean();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "process_timeout = 60\n").unwrap();
        env.set("PROCESS_TIMEOUT", "5");

        let config = PublisherConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.process_budget(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let _env = ScopedEnv::clean();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "sds_url = \"https://sds.test\"\nschema_publish_bucket_name = \"intake\"\nprocess_timeout = 60\n",
        )
        .unwrap();

        let config = PublisherConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.schema_publish_bucket_name, "intake");
        assert_eq!(config.process_budget(), Duration::from_secs(60));
        assert_eq!(config.github_schema_url, default_github_schema_url());
    }
}
