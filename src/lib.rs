/// e-KYC Registration Service Library
///
/// This library provides the core functionality for the healthcare-records
/// registration service: Aadhaar OTP verification against an external e-KYC
/// provider, the three-step registration handshake, and credential-based
/// login over role-partitioned user collections.
///
/// # Features
/// - e-KYC OTP dispatch and verification
/// - Pending-verification store with TTL expiry
/// - DynamoDB data persistence with atomic duplicate rejection
/// - HTTP JSON interface
/// - Per-subject OTP dispatch rate limiting
///
/// # Modules
/// - `kyc`: e-KYC provider client, profile resolution, and rate limiting
/// - `pending`: transient handshake state keyed by subject id
/// - `registration`: the send-OTP / verify-OTP / register handshake
/// - `db`: user directory over role-partitioned collections
/// - `auth`: login and session lifecycle
/// - `http`: axum routes and error mapping
/// - `config`: configuration management

pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod kyc;
pub mod pending;
pub mod registration;
