use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors detected while validating a loaded configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Main configuration for the intake service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// S3 image storage configuration
    pub s3: S3Config,
    /// DynamoDB record table configuration
    #[serde(default)]
    pub records: RecordsConfig,
    /// Rekognition label detection configuration
    #[serde(default)]
    pub labels: LabelsConfig,
    /// Remote processing function configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Completion notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Largest accepted request body (image uploads included)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

/// S3 image storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket receiving uploaded item images
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Grant public-read on every uploaded image
    #[serde(default = "default_true")]
    pub public_read: bool,
    /// Base URL used instead of the virtual-hosted S3 URL when building image links
    pub public_base_url: Option<String>,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
}

/// DynamoDB record table configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RecordsConfig {
    /// Table holding item records
    #[serde(default = "default_table_name")]
    pub table_name: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for DynamoDB Local)
    pub endpoint_url: Option<String>,
    /// Create the table at startup when it does not exist
    #[serde(default = "default_true")]
    pub create_table_if_missing: bool,
    /// Provisioned read capacity for a newly created table
    #[serde(default = "default_capacity_units")]
    pub read_capacity_units: i64,
    /// Provisioned write capacity for a newly created table
    #[serde(default = "default_capacity_units")]
    pub write_capacity_units: i64,
    /// How long to wait for a newly created table to become active
    #[serde(default = "default_table_wait_secs")]
    pub table_wait_secs: u64,
}

/// Rekognition label detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LabelsConfig {
    /// Maximum number of labels requested per image
    #[serde(default = "default_max_labels")]
    pub max_labels: i32,
    /// Minimum label confidence (0-100); unset lets the service decide
    pub min_confidence: Option<f32>,
    /// Label stored when detection fails
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,
}

/// Remote processing function configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Lambda function invoked with every new item
    #[serde(default = "default_function_name")]
    pub function_name: String,
    /// Turn a failed invocation into a server error instead of logging it
    #[serde(default)]
    pub fail_on_function_error: bool,
}

/// Completion notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Send a notification after each created item
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Notification body
    #[serde(default = "default_notification_message")]
    pub message: String,
    /// SMS destination in E.164 format
    pub phone_number: Option<String>,
    /// SNS topic destination
    pub topic_arn: Option<String>,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
}

// Default value functions
fn default_service_name() -> String {
    "intake-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024 // 20MB
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_table_name() -> String {
    "vehicles_list_with_labels".to_string()
}

fn default_capacity_units() -> i64 {
    5
}

fn default_table_wait_secs() -> u64 {
    120
}

fn default_max_labels() -> i32 {
    10
}

fn default_fallback_label() -> String {
    "image".to_string()
}

fn default_function_name() -> String {
    "vehicles_add_operation".to_string()
}

fn default_notification_message() -> String {
    "Data Successfully Saved".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("service.name", "intake-service")?
            .set_default("service.log_level", "info")?
            .set_default("service.metrics_port", 9090)?
            .set_default("api.host", "0.0.0.0")?
            .set_default("api.port", 8000)?
            .set_default("records.table_name", default_table_name())?
            .set_default("processing.function_name", default_function_name())?
            // Add config file if present
            .add_source(config::File::with_name("config/intake").required(false))
            .add_source(config::File::with_name("/etc/intake/intake").required(false))
            // Override with environment variables
            // INTAKE__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("INTAKE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Check values the deserializer cannot enforce
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::MissingRequired("s3.bucket".to_string()));
        }

        if self.records.table_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("records.table_name".to_string()));
        }

        if self.processing.function_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "processing.function_name".to_string(),
            ));
        }

        // Rekognition accepts 1..=1000
        if !(1..=1000).contains(&self.labels.max_labels) {
            return Err(ConfigError::InvalidValue {
                key: "labels.max_labels".to_string(),
                message: format!("{} is outside 1..=1000", self.labels.max_labels),
            });
        }

        if self.s3.part_size_bytes < 5 * 1024 * 1024 {
            return Err(ConfigError::InvalidValue {
                key: "s3.part_size_bytes".to_string(),
                message: "S3 parts must be at least 5MB".to_string(),
            });
        }

        if self.notification.enabled
            && self.notification.phone_number.is_none()
            && self.notification.topic_arn.is_none()
        {
            return Err(ConfigError::MissingRequired(
                "notification.phone_number or notification.topic_arn".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the table creation wait limit as Duration
    pub fn table_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.records.table_wait_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: false,
            cors_origins: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            region: default_region(),
            endpoint_url: None,
            create_table_if_missing: true,
            read_capacity_units: default_capacity_units(),
            write_capacity_units: default_capacity_units(),
            table_wait_secs: default_table_wait_secs(),
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            function_name: default_function_name(),
            fail_on_function_error: false,
        }
    }
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            max_labels: default_max_labels(),
            min_confidence: None,
            fallback_label: default_fallback_label(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            message: default_notification_message(),
            phone_number: None,
            topic_arn: None,
            region: default_region(),
        }
    }
}
