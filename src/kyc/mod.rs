//! e-KYC provider client.
//!
//! Wraps the provider's Aadhaar OTP-issuance and OTP-verification endpoints
//! and translates transport and protocol failures into typed errors. Each
//! invocation is a single attempt; OTP issuance is rate limited upstream, so
//! retry policy is deliberately left to the caller.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

pub mod profile;
pub mod rate_limit;

pub use profile::{ProfileSummary, VerificationPayload};

const API_VERSION: &str = "2.0";
const OTP_REQUEST_ENTITY: &str = "in.co.sandbox.kyc.aadhaar.okyc.otp.request";
const VERIFY_REQUEST_ENTITY: &str = "in.co.sandbox.kyc.aadhaar.okyc.request";

#[derive(Debug, Clone)]
pub struct KycConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: String,
    pub timeout_secs: u64,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("subject id must be exactly 12 numeric digits")]
    InvalidSubject,
    #[error("otp must be exactly 6 numeric digits")]
    InvalidOtp,
    #[error("reference id must not be empty")]
    MissingReference,
    #[error("provider rejected the request ({status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("transport failure calling the KYC provider: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Returns true if `subject_id` is a well-formed 12-digit Aadhaar-style id.
pub fn is_valid_subject_id(subject_id: &str) -> bool {
    subject_id.len() == 12 && subject_id.bytes().all(|b| b.is_ascii_digit())
}

/// Returns true if `otp` is a well-formed 6-digit one-time password.
pub fn is_valid_otp(otp: &str) -> bool {
    otp.len() == 6 && otp.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Serialize)]
struct OtpRequest<'a> {
    #[serde(rename = "@entity")]
    entity: &'a str,
    aadhaar_number: &'a str,
    consent: &'a str,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "@entity")]
    entity: &'a str,
    reference_id: &'a str,
    otp: &'a str,
}

/// Provider responses wrap the payload in a `data` object with an optional
/// top-level `message` on rejection.
#[derive(Debug, Default, Deserialize)]
struct ProviderEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Client for the e-KYC provider's OTP endpoints.
pub struct KycClient {
    config: KycConfig,
    client: Client,
}

impl KycClient {
    pub fn new(config: KycConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Requests OTP dispatch for `subject_id` and returns the provider's
    /// reference id correlating the send with the later verification.
    pub async fn send_otp(&self, subject_id: &str) -> Result<String, Error> {
        if !is_valid_subject_id(subject_id) {
            return Err(Error::InvalidSubject);
        }

        let url = format!("{}/kyc/aadhaar/okyc/otp", self.config.base_url);
        let request = OtpRequest {
            entity: OTP_REQUEST_ENTITY,
            aadhaar_number: subject_id,
            consent: "y",
            reason: "For KYC",
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.access_token)
            .header("x-api-key", &self.config.api_key)
            .header("x-api-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let envelope = response.json::<ProviderEnvelope>().await.unwrap_or_default();
            let message = envelope
                .message
                .unwrap_or_else(|| "Failed to send OTP".to_string());
            error!("OTP dispatch rejected by provider ({}): {}", status, message);
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ProviderEnvelope = response.json().await?;
        let reference_id = envelope
            .data
            .as_ref()
            .and_then(|data| data.get("reference_id"))
            .map(value_to_string)
            .filter(|id| !id.is_empty())
            .ok_or(Error::Upstream {
                status: status.as_u16(),
                message: "Provider response missing reference id".to_string(),
            })?;

        info!("OTP dispatched, reference id {}", reference_id);
        Ok(reference_id)
    }

    /// Submits `otp` against `reference_id` and returns the subject's profile
    /// payload verbatim on success.
    pub async fn verify_otp(
        &self,
        reference_id: &str,
        otp: &str,
    ) -> Result<VerificationPayload, Error> {
        if reference_id.is_empty() {
            return Err(Error::MissingReference);
        }
        if !is_valid_otp(otp) {
            return Err(Error::InvalidOtp);
        }

        let url = format!("{}/kyc/aadhaar/okyc/otp/verify", self.config.base_url);
        let request = VerifyRequest {
            entity: VERIFY_REQUEST_ENTITY,
            reference_id,
            otp,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.access_token)
            .header("x-api-key", &self.config.api_key)
            .header("x-api-version", API_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let envelope = response.json::<ProviderEnvelope>().await.unwrap_or_default();
            let message = envelope
                .message
                .unwrap_or_else(|| "Failed to verify OTP".to_string());
            error!(
                "OTP verification rejected by provider ({}): {}",
                status, message
            );
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ProviderEnvelope = response.json().await?;
        let data = envelope.data.ok_or(Error::Upstream {
            status: status.as_u16(),
            message: "Provider response missing profile data".to_string(),
        })?;

        info!("OTP verified for reference id {}", reference_id);
        Ok(VerificationPayload::new(data))
    }
}
