//! # Storage Queue CLI
//!
//! Command-line walkthrough of the storage-queue client.
//!
//! Each subcommand performs one step of the queue lifecycle against the
//! configured service:
//! - Queue management: create, length, delete
//! - Message handling: insert, peek, update, dequeue, batch dequeue
//! - `async-demo` and `demo` replay the whole walkthrough in one process
//!
//! Without a connection string the commands run against an in-memory queue,
//! which only lives as long as the process.

use chrono::Duration;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use storage_queue::{
    ConfigurationError, CreateOutcome, DeleteOutcome, Endpoint, MessageEncoding, OperationError,
    ProviderConfig, ProviderType, QueueClient, QueueClientFactory, QueueConfig, QueueError,
    QueueHandle, StorageQueueConfig, ValidationError,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// Queue used when neither the command line nor the configuration names one
pub const DEFAULT_QUEUE_NAME: &str = "quickstartqueues";

/// Endpoint handed to the in-memory provider
pub const IN_MEMORY_ENDPOINT: &str = "memory://local";

/// Prefix for environment overrides, e.g. `SQ__QUEUE_NAME=orders`
pub const ENV_PREFIX: &str = "SQ";

/// Visibility window used when a command receives a single message
const DEFAULT_RECEIVE_SECONDS: i64 = 30;

// ============================================================================
// CLI Structure
// ============================================================================

/// Storage Queue CLI - lease-based queue walkthrough
#[derive(Parser)]
#[command(name = "storage-queue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Walk through the lifecycle of a durable storage queue")]
#[command(
    long_about = "Creates a queue, sends, peeks, updates and dequeues messages under visibility leases, then deletes the queue"
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STORAGE_QUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Queue service endpoint; the in-memory queue is used when absent
    #[arg(long, env = "STORAGE_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Queue to operate on
    #[arg(short, long)]
    pub queue: Option<String>,

    /// Message body encoding on the wire
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the queue if it does not exist
    Create,

    /// Send a message, creating the queue first when needed
    Insert {
        /// Message body
        message: String,
    },

    /// Show the next visible message without leasing it
    Peek,

    /// Lease the next message and replace its contents
    Update {
        /// Replacement body
        #[arg(long, default_value = "Updated contents")]
        contents: String,

        /// Seconds the message stays hidden after the update
        #[arg(long, default_value = "60")]
        visibility_seconds: i64,
    },

    /// Receive the next message, print it and delete it
    Dequeue,

    /// Receive a batch of messages and delete each of them
    DequeueBatch {
        /// Maximum messages to receive
        #[arg(short = 'n', long, default_value = "20")]
        count: u32,

        /// Minutes the batch stays leased
        #[arg(long, default_value = "5")]
        visibility_minutes: i64,
    },

    /// Print the approximate number of messages in the queue
    Length,

    /// Delete the queue and everything in it
    DeleteQueue,

    /// Create, send, receive, delete and drop a queue in one round trip
    AsyncDemo,

    /// Run every step of the walkthrough in order
    Demo,
}

/// Wire encoding selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    Text,
    Base64,
}

impl From<EncodingArg> for MessageEncoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Text => MessageEncoding::Text,
            EncodingArg::Base64 => MessageEncoding::Base64,
        }
    }
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue operation failed: {0}")]
    Queue(#[from] OperationError),

    #[error("Client error: {0}")]
    Client(#[from] QueueError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Queue(_) => 2,
            Self::Client(_) => 3,
            Self::CommandFailed { .. } => 4,
            Self::InvalidArgument { .. } => 5,
        }
    }
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid client configuration: {0}")]
    Invalid(#[from] ConfigurationError),

    #[error("Invalid value for {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: ValidationError,
    },

    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },
}

// ============================================================================
// Configuration Types
// ============================================================================

/// CLI configuration structure
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct CliConfig {
    /// Queue service endpoint
    pub connection_string: Option<String>,

    /// Queue to operate on
    pub queue_name: Option<String>,

    /// Client settings
    pub client: QueueConfig,
}

/// Client configuration and queue handle the commands run against
#[derive(Debug, Clone)]
pub struct Target {
    pub config: QueueConfig,
    pub queue: QueueHandle,
}

impl CliConfig {
    /// Apply command-line overrides and resolve the queue to operate on.
    ///
    /// A connection string switches an in-memory configuration to the
    /// storage provider. A storage configuration without one is rejected.
    pub fn resolve(
        self,
        connection_string: Option<String>,
        queue_name: Option<String>,
        encoding: Option<EncodingArg>,
    ) -> Result<Target, ConfigError> {
        let mut config = self.client;
        let connection_string = connection_string.or(self.connection_string);
        let queue_name = queue_name
            .or(self.queue_name)
            .unwrap_or_else(|| DEFAULT_QUEUE_NAME.to_string());

        let endpoint_value = match (connection_string, config.provider.provider_type()) {
            (Some(value), ProviderType::StorageQueue) => value,
            (Some(value), ProviderType::InMemory) => {
                config.provider = ProviderConfig::StorageQueue(StorageQueueConfig::default());
                value
            }
            (None, ProviderType::InMemory) => IN_MEMORY_ENDPOINT.to_string(),
            (None, ProviderType::StorageQueue) => {
                return Err(ConfigError::MissingRequired {
                    key: "connection_string".to_string(),
                })
            }
        };

        if let (Some(encoding), ProviderConfig::StorageQueue(storage)) =
            (encoding, &mut config.provider)
        {
            storage.message_encoding = encoding.into();
        }

        config.validate()?;

        let endpoint = Endpoint::new(endpoint_value).map_err(|source| ConfigError::InvalidValue {
            key: "connection_string".to_string(),
            source,
        })?;
        let queue =
            QueueHandle::parse(&queue_name, endpoint).map_err(|source| ConfigError::InvalidValue {
                key: "queue_name".to_string(),
                source,
            })?;

        Ok(Target { config, queue })
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_configuration(cli.config.as_ref())?;
    let target = config.resolve(cli.connection_string.clone(), cli.queue.clone(), cli.encoding)?;

    info!(
        provider = ?target.config.provider.provider_type(),
        queue = %target.queue.name(),
        "Connecting to queue service"
    );

    let client = QueueClientFactory::create_client(target.config)?;
    execute_command(cli.command, &client, &target.queue).await
}

/// Run one subcommand against `queue`
pub async fn execute_command(
    command: Commands,
    client: &QueueClient,
    queue: &QueueHandle,
) -> Result<(), CliError> {
    debug!(command = ?command, "Executing command");

    match command {
        Commands::Create => execute_create_command(client, queue).await,
        Commands::Insert { message } => execute_insert_command(client, queue, message).await,
        Commands::Peek => execute_peek_command(client, queue).await,
        Commands::Update {
            contents,
            visibility_seconds,
        } => execute_update_command(client, queue, contents, visibility_seconds).await,
        Commands::Dequeue => execute_dequeue_command(client, queue).await,
        Commands::DequeueBatch {
            count,
            visibility_minutes,
        } => execute_dequeue_batch_command(client, queue, count, visibility_minutes).await,
        Commands::Length => execute_length_command(client, queue).await,
        Commands::DeleteQueue => execute_delete_queue_command(client, queue).await,
        Commands::AsyncDemo => execute_async_demo_command(client, queue).await,
        Commands::Demo => execute_demo_command(client, queue).await,
    }
}

fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = if cli.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    result.map_err(|e| CliError::CommandFailed {
        message: format!("Failed to initialize logging: {}", e),
    })
}

/// Load configuration from the optional file, overlaid by `SQ__` variables
pub fn load_configuration(config_path: Option<&PathBuf>) -> Result<CliConfig, ConfigError> {
    let mut builder = config::Config::builder();

    if let Some(path) = config_path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound { path: path.clone() });
        }
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
        info!(path = %path.display(), "Loading configuration from file");
    }

    let config = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}

// ============================================================================
// Commands
// ============================================================================

async fn execute_create_command(client: &QueueClient, queue: &QueueHandle) -> Result<(), CliError> {
    match client.create_if_not_exists(queue).await? {
        CreateOutcome::Created => println!("Queue created: '{}'", queue.name()),
        CreateOutcome::AlreadyExists => println!("Queue exists: '{}'", queue.name()),
    }
    Ok(())
}

async fn execute_insert_command(
    client: &QueueClient,
    queue: &QueueHandle,
    message: String,
) -> Result<(), CliError> {
    client.create_if_not_exists(queue).await?;
    let receipt = client.send(queue, message.clone()).await?;

    info!(message_id = %receipt.message_id, "Message inserted");
    println!("Inserted: {}", message);
    Ok(())
}

async fn execute_peek_command(client: &QueueClient, queue: &QueueHandle) -> Result<(), CliError> {
    let peeked = client.peek(queue, 1).await?;
    match peeked.first() {
        Some(message) => println!(
            "Peeked message: '{}'",
            String::from_utf8_lossy(&message.body)
        ),
        None => println!("No visible messages in queue '{}'", queue.name()),
    }
    Ok(())
}

async fn execute_update_command(
    client: &QueueClient,
    queue: &QueueHandle,
    contents: String,
    visibility_seconds: i64,
) -> Result<(), CliError> {
    if visibility_seconds < 0 {
        return Err(CliError::InvalidArgument {
            arg: "visibility-seconds".to_string(),
            message: "must not be negative".to_string(),
        });
    }
    let visibility_timeout = visibility_window(
        "visibility-seconds",
        Duration::try_seconds(visibility_seconds),
    )?;

    let Some(message) = client
        .receive_one(queue, Duration::seconds(DEFAULT_RECEIVE_SECONDS))
        .await?
    else {
        println!("No visible messages in queue '{}'", queue.name());
        return Ok(());
    };

    let receipt = client
        .update_message(
            queue,
            &message.message_id,
            &message.pop_receipt,
            Some(contents.clone().into()),
            visibility_timeout,
        )
        .await?;

    println!(
        "Updated message {}: '{}', hidden until {}",
        message.message_id, contents, receipt.visible_at
    );
    Ok(())
}

async fn execute_dequeue_command(client: &QueueClient, queue: &QueueHandle) -> Result<(), CliError> {
    let Some(message) = client
        .receive_one(queue, Duration::seconds(DEFAULT_RECEIVE_SECONDS))
        .await?
    else {
        println!("No visible messages in queue '{}'", queue.name());
        return Ok(());
    };

    println!(
        "Dequeued message: '{}'",
        String::from_utf8_lossy(&message.body)
    );
    client
        .delete_message(queue, &message.message_id, &message.pop_receipt)
        .await?;
    Ok(())
}

async fn execute_dequeue_batch_command(
    client: &QueueClient,
    queue: &QueueHandle,
    count: u32,
    visibility_minutes: i64,
) -> Result<(), CliError> {
    let visibility_timeout = visibility_window(
        "visibility-minutes",
        Duration::try_minutes(visibility_minutes),
    )?;
    let messages = client.receive(queue, count, visibility_timeout).await?;

    for message in &messages {
        println!(
            "De-queued message: '{}'",
            String::from_utf8_lossy(&message.body)
        );
        client
            .delete_message(queue, &message.message_id, &message.pop_receipt)
            .await?;
    }

    info!(count = messages.len(), "Batch dequeued");
    Ok(())
}

fn visibility_window(arg: &str, window: Option<Duration>) -> Result<Duration, CliError> {
    window.ok_or_else(|| CliError::InvalidArgument {
        arg: arg.to_string(),
        message: "value is too large for a visibility window".to_string(),
    })
}

async fn execute_length_command(client: &QueueClient, queue: &QueueHandle) -> Result<(), CliError> {
    let properties = client.get_properties(queue).await?;
    println!(
        "Number of messages in queue: {}",
        properties.approximate_message_count
    );
    Ok(())
}

async fn execute_delete_queue_command(
    client: &QueueClient,
    queue: &QueueHandle,
) -> Result<(), CliError> {
    match client.delete_queue(queue).await? {
        DeleteOutcome::Deleted => println!("Queue deleted: '{}'", queue.name()),
        DeleteOutcome::AlreadyAbsent => println!("Queue did not exist: '{}'", queue.name()),
    }
    Ok(())
}

async fn execute_async_demo_command(
    client: &QueueClient,
    queue: &QueueHandle,
) -> Result<(), CliError> {
    match client.create_if_not_exists(queue).await? {
        CreateOutcome::Created => println!("Queue '{}' created", queue.name()),
        CreateOutcome::AlreadyExists => println!("Queue '{}' exists", queue.name()),
    }

    client.send(queue, "Hello, World").await?;
    println!("Message added");

    let message = client
        .receive_one(queue, Duration::seconds(DEFAULT_RECEIVE_SECONDS))
        .await?
        .ok_or_else(|| CliError::CommandFailed {
            message: format!("Message sent to '{}' was not received", queue.name()),
        })?;
    let body = String::from_utf8_lossy(&message.body).into_owned();
    println!("Retrieved message with content '{}'", body);

    client
        .delete_message(queue, &message.message_id, &message.pop_receipt)
        .await?;
    println!("Deleted message: '{}'", body);

    client.delete_queue(queue).await?;
    println!("Deleted queue: '{}'", queue.name());
    Ok(())
}

async fn execute_demo_command(client: &QueueClient, queue: &QueueHandle) -> Result<(), CliError> {
    execute_create_command(client, queue).await?;
    for message in ["First message", "Second message", "Third message"] {
        execute_insert_command(client, queue, message.to_string()).await?;
    }
    execute_peek_command(client, queue).await?;
    execute_update_command(client, queue, "Updated contents".to_string(), 60).await?;
    execute_dequeue_command(client, queue).await?;
    execute_length_command(client, queue).await?;
    execute_dequeue_batch_command(client, queue, 20, 5).await?;
    execute_delete_queue_command(client, queue).await?;
    execute_async_demo_command(client, queue).await
}
