//! SDS Publisher CLI
//!
//! Publishes survey schemas to SDS and manages publisher configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sds_schema_publisher::gcp::{Bucket, GcsClient, MetadataServer, ObjectStore, PubSubClient, SecretManagerClient};
use sds_schema_publisher::{
    within_budget, BucketPublisher, GithubPublisher, GithubSource, NotificationService, PublishError,
    PublishOutcome, PublisherConfig, SdsClient,
};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "sds-publisher")]
#[command(about = "Validate survey schemas and publish them to SDS")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a schema from the schema definitions repository
    PublishGithub {
        /// Path of the schema file within the repository
        path: String,
        /// Do not send success/error notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Publish a schema from the intake bucket, deleting it once posted
    PublishBucket {
        /// Object name in the publish bucket
        file: String,
        /// Do not send success/error notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// Upload a schema file, or every .json file in a directory, to a bucket
    Upload {
        path: PathBuf,
        #[arg(short, long, value_enum, default_value = "publish")]
        bucket: BucketArg,
    },

    /// View and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Output as TOML
        #[arg(long)]
        toml: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path (default: publisher.toml)
        #[arg(short, long, default_value = "publisher.toml")]
        output: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BucketArg {
    Schema,
    Publish,
}

impl From<BucketArg> for Bucket {
    fn from(arg: BucketArg) -> Self {
        match arg {
            BucketArg::Schema => Bucket::Schema,
            BucketArg::Publish => Bucket::SchemaPublish,
        }
    }
}

enum Target {
    Github(String),
    Bucket(String),
}

/// Clients shared by every command of one process
struct Clients {
    http: reqwest::Client,
    tokens: Arc<MetadataServer>,
}

impl Clients {
    fn new(config: &PublisherConfig) -> Self {
        let http = reqwest::Client::new();
        let tokens = Arc::new(MetadataServer::new(http.clone(), config.metadata_url.clone()));
        Self { http, tokens }
    }

    fn storage(&self, config: &PublisherConfig) -> GcsClient {
        GcsClient::new(self.http.clone(), config.storage_url.clone(), self.tokens.clone())
    }

    /// SDS client, carrying an identity token for the OAuth client when enabled
    async fn sds(&self, config: &PublisherConfig) -> Result<SdsClient, PublishError> {
        if !config.authenticate {
            return SdsClient::new(config, None);
        }

        let secrets = SecretManagerClient::new(
            self.http.clone(),
            config.secret_manager_url.clone(),
            config.project_id.clone(),
            config.secret_id.clone(),
            self.tokens.clone(),
        );
        let audience = secrets.get_oauth_client_id().await?;
        let token = self
            .tokens
            .identity_token(&audience)
            .await
            .map_err(|e| PublishError::SecretAccess { detail: e.to_string() })?;
        SdsClient::new(config, Some(&token))
    }
}

fn main() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("❌ Error: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PublisherConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::PublishGithub { path, no_notify } => {
            run_publish(&config, Target::Github(path), !no_notify).await
        }

        Commands::PublishBucket { file, no_notify } => {
            run_publish(&config, Target::Bucket(file), !no_notify).await
        }

        Commands::Upload { path, bucket } => {
            let clients = Clients::new(&config);
            let storage = clients.storage(&config);
            let bucket_name = Bucket::from(bucket).name(&config);

            for file in schema_files(&path)? {
                let name = storage.upload(bucket_name, &file).await?;
                println!("✅ Uploaded {} to {}", name, bucket_name);
            }
            Ok(())
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show { toml, json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else if toml {
                    println!("{}", ::toml::to_string_pretty(&config)?);
                } else {
                    println!("📋 SDS Publisher Configuration\n");
                    println!("Project: {}", config.project_id);
                    println!("Process timeout: {}s", config.process_timeout);
                    println!("\nSDS:");
                    println!("  URL: {}", config.sds_url);
                    println!("  Post endpoint: {}", config.post_schema_url);
                    println!("  Metadata endpoint: {}", config.get_schema_metadata_url);
                    println!("  Authenticate: {} (secret {})", config.authenticate, config.secret_id);
                    println!("\nSources:");
                    println!("  GitHub: {}", config.github_schema_url);
                    println!("  Publish bucket: {}", config.schema_publish_bucket_name);
                    println!("  Schema bucket: {}", config.schema_bucket_name);
                    println!("\nTopics:");
                    println!("  Success: {}", config.publish_schema_success_topic_id);
                    println!("  Error: {}", config.publish_schema_error_topic_id);
                    println!("  Queue: {}", config.publish_schema_queue_topic_id);
                }
                Ok(())
            }

            ConfigCommands::Init { output } => {
                PublisherConfig::default().save(&output)?;
                println!("✅ Created config file: {}", output);
                Ok(())
            }
        },
    }
}

async fn run_publish(config: &PublisherConfig, target: Target, notify: bool) -> anyhow::Result<()> {
    let clients = Clients::new(config);

    let filepath = match &target {
        Target::Github(path) => path.clone(),
        Target::Bucket(file) => file.clone(),
    };
    let result = within_budget(
        config.process_budget(),
        &filepath,
        publish(config, &clients, target),
    )
    .await;

    if notify {
        send_notification(config, &clients, &result).await;
    }

    match result {
        Ok(outcome) => {
            println!(
                "✅ Published {} (survey {}, version {})",
                outcome.filepath, outcome.survey_id, outcome.schema_version
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

async fn publish(
    config: &PublisherConfig,
    clients: &Clients,
    target: Target,
) -> Result<PublishOutcome, PublishError> {
    let sds = clients.sds(config).await?;

    match target {
        Target::Github(path) => {
            let source = GithubSource::new(clients.http.clone(), config.github_schema_url.clone());
            GithubPublisher::new(source, &sds).publish(&path).await
        }
        Target::Bucket(file) => {
            let storage = clients.storage(config);
            BucketPublisher::from_bucket(&storage, Bucket::SchemaPublish.name(config), &sds)
                .publish(&file)
                .await
        }
    }
}

async fn send_notification(
    config: &PublisherConfig,
    clients: &Clients,
    result: &Result<PublishOutcome, PublishError>,
) {
    let pubsub = PubSubClient::new(
        clients.http.clone(),
        config.pubsub_url.clone(),
        config.project_id.clone(),
        clients.tokens.clone(),
    );
    let notifications = NotificationService::new(
        &pubsub,
        config.publish_schema_success_topic_id.clone(),
        config.publish_schema_error_topic_id.clone(),
    );

    let sent = match result {
        Ok(outcome) => notifications.notify_success(outcome).await,
        Err(e) => notifications.notify_error(e).await,
    };
    if let Err(e) = sent {
        tracing::error!("notification not sent: {}", e);
    }
}

/// A single file, or every .json file below a directory
fn schema_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", path.display()))?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "json") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
