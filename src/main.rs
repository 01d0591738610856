//! e-KYC Registration Service
//!
//! Main entry point for the healthcare-records registration service.
//! The service fronts a third-party Aadhaar e-KYC provider and a document
//! database, implementing user registration and login.
//!
//! # Flow
//! 1. User submits an Aadhaar-style subject id and password
//! 2. Service requests OTP dispatch from the e-KYC provider
//! 3. User submits the OTP for verification
//! 4. Service verifies the OTP and captures the subject's profile
//! 5. User submits medical profile fields
//! 6. Service persists the assembled patient record

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::fmt;

use ekyc_registration::auth::AuthService;
use ekyc_registration::config::Config;
use ekyc_registration::db::dynamodb::{DirectoryConfig, DynamoDbDirectory};
use ekyc_registration::db::memory::MemoryDirectory;
use ekyc_registration::db::UserDirectory;
use ekyc_registration::http::{router, AppState};
use ekyc_registration::kyc::rate_limit::{RateLimitConfig, RateLimiter};
use ekyc_registration::kyc::{KycClient, KycConfig};
use ekyc_registration::pending::PendingStore;
use ekyc_registration::registration::RegistrationService;

/// Initializes the logging system with appropriate configuration.
///
/// Sets up structured logging with timestamps and log levels using
/// the tracing framework. Log level is configurable via environment.
fn setup_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    fmt()
        .with_max_level(Level::DEBUG)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_level(true)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .try_init()
        .map_err(|e| e.into())
}

/// Initializes and starts all service dependencies.
///
/// Sets up the following components:
/// - KYC client for OTP dispatch and verification
/// - User directory (DynamoDB, or in-memory when disabled)
/// - Pending-verification store with its cleanup task
/// - HTTP server with the registration and auth endpoints
async fn setup_services(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Initializing KYC client for {}", config.kyc.base_url);
    let kyc_client = Arc::new(KycClient::new(KycConfig {
        base_url: config.kyc.base_url.clone(),
        api_key: config.kyc.api_key.clone(),
        access_token: config.kyc.access_token.clone(),
        timeout_secs: config.kyc.timeout_secs,
    })?);
    info!("KYC client initialized successfully");

    let directory: Arc<dyn UserDirectory> = if config.dynamodb.enabled {
        info!(
            "Initializing DynamoDB directory in region {}",
            config.dynamodb.region
        );
        Arc::new(
            DynamoDbDirectory::new(DirectoryConfig {
                region: config.dynamodb.region.clone(),
                endpoint: config.dynamodb.endpoint.clone(),
                table_prefix: config.dynamodb.table_prefix.clone(),
            })
            .await?,
        )
    } else {
        info!("DynamoDB disabled, using in-memory directory");
        Arc::new(MemoryDirectory::new())
    };

    let pending = PendingStore::new(Duration::from_secs(config.verification.pending_ttl_secs));
    let rate_limiter = RateLimiter::new(RateLimitConfig {
        max_sends: config.verification.max_sends_per_window,
        window_secs: config.verification.send_window_secs,
    });

    let registration = Arc::new(RegistrationService::new(
        kyc_client,
        pending.clone(),
        directory.clone(),
        rate_limiter,
    ));
    let auth = AuthService::new(
        directory,
        Duration::from_secs(config.auth.session_ttl_secs),
    );

    // Reap orphaned handshakes and stale sessions so neither accumulates.
    let cleanup_interval = Duration::from_secs(config.verification.cleanup_interval_secs);
    let auth_cleanup = auth.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            pending.cleanup_expired();
            auth_cleanup.cleanup_expired();
        }
    });

    let app = router(AppState { registration, auth });

    let addr = format!("{}:{}", config.server.endpoint, config.server.port);
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Main entry point for the registration service.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    setup_logging()?;
    info!("e-KYC Registration Service starting up...");

    info!("Loading configuration...");
    let config = Config::new().map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    info!("Configuration loaded successfully");

    setup_services(config).await?;

    Ok(())
}
