/// Configuration Module
///
/// Provides configuration management for the e-KYC Registration Service.
/// Handles loading and parsing of YAML configuration files and environment variables.
/// Environment variables (prefixed with `APP_`) override file values.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use config::{Config as ConfigFile, File, Environment};

/// Application metadata configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct Application {
    /// Name of the application
    pub name: String,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub endpoint: String,
    /// Server port
    pub port: u16,
}

/// KYC provider configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct KycSettings {
    /// Base URL of the e-KYC provider (e.g., "https://api.sandbox.co.in")
    pub base_url: String,
    /// API key sent in the `x-api-key` header
    pub api_key: String,
    /// Access token sent in the `Authorization` header
    pub access_token: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// DynamoDB configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DynamoDbConfig {
    /// Whether DynamoDB is enabled; when false an in-memory directory is used
    pub enabled: bool,
    /// Prefix applied to the role collection table names
    pub table_prefix: Option<String>,
    /// AWS region
    pub region: String,
    /// DynamoDB endpoint (optional, for local development)
    pub endpoint: Option<String>,
}

/// Auth session configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuthConfig {
    /// TTL for logged-in session tokens in seconds
    pub session_ttl_secs: u64,
}

/// Verification handshake configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerificationConfig {
    /// TTL for pending verification entries in seconds
    pub pending_ttl_secs: u64,
    /// Interval between expired-entry sweeps in seconds
    pub cleanup_interval_secs: u64,
    /// Maximum OTP dispatches per subject within the window
    pub max_sends_per_window: u32,
    /// Length of the OTP dispatch rate-limit window in seconds
    pub send_window_secs: u64,
}

/// Application configuration settings
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Application metadata
    pub application: Application,
    /// HTTP server configuration
    pub server: ServerConfig,
    /// KYC provider configuration
    pub kyc: KycSettings,
    /// DynamoDB configuration
    pub dynamodb: DynamoDbConfig,
    /// Auth session configuration
    pub auth: AuthConfig,
    /// Verification handshake configuration
    pub verification: VerificationConfig,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Missing required config value: {0}")]
    MissingConfig(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl Config {
    /// Creates a new Config instance by loading and merging configuration from multiple sources.
    ///
    /// # Configuration Sources
    /// Configuration is loaded in the following order (later sources override earlier ones):
    /// 1. Base configuration (`config/application.yml`)
    /// 2. Environment variables (prefixed with `APP_`)
    ///
    /// # Errors
    /// Returns a `ConfigError` if:
    /// - Required configuration files cannot be read
    /// - Configuration values cannot be parsed
    /// - Required values are missing
    pub fn new() -> Result<Self, ConfigError> {
        let builder = ConfigFile::builder()
            .add_source(File::with_name("config/application.yml"))
            .add_source(Environment::with_prefix("APP").separator("__"));

        let config = builder.build()?;
        config.try_deserialize().map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}
