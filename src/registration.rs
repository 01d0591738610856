//! Registration handshake.
//!
//! Orchestrates the three-step flow: send OTP, verify OTP, register. State
//! between the calls lives in the injected [`PendingStore`], always keyed by
//! the subject id the caller supplies; registration consumes the entry
//! exactly once. The derived user id and the stored password hash are both
//! SHA-256 based, matching the ids already present in the document store.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::db::{self, CreateOutcome, EmergencyContact, Role, UserDirectory, UserRecord};
use crate::kyc::rate_limit::RateLimiter;
use crate::kyc::{self, KycClient, ProfileSummary};
use crate::pending::PendingStore;

/// Derives the short stable user id from the subject id and password.
pub fn derive_user_id(subject_id: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subject_id.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())[..10].to_string()
}

/// One-way password hash used for storage and login comparison.
pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(String),
    #[error("Session expired, please restart the verification process")]
    SessionExpired,
    #[error("Missing verification data. Please complete OTP verification first.")]
    MissingVerification,
    #[error("User already exists")]
    DuplicateUser,
    #[error("Too many OTP requests, please try again later")]
    RateLimited,
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<kyc::Error> for RegistrationError {
    fn from(err: kyc::Error) -> Self {
        match err {
            kyc::Error::InvalidSubject => {
                RegistrationError::Validation("Invalid Aadhaar number".to_string())
            }
            kyc::Error::InvalidOtp => RegistrationError::Validation("Invalid OTP".to_string()),
            kyc::Error::MissingReference => {
                RegistrationError::Validation("Missing reference ID".to_string())
            }
            kyc::Error::Upstream { status, message } => {
                RegistrationError::Upstream { status, message }
            }
            kyc::Error::Transport(e) => RegistrationError::Internal(e.into()),
        }
    }
}

impl From<db::Error> for RegistrationError {
    fn from(err: db::Error) -> Self {
        RegistrationError::Internal(err.into())
    }
}

/// A medical field that may arrive as a JSON list or a comma-delimited
/// string; both normalize to a trimmed, non-empty list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListOrString {
    List(Vec<String>),
    Text(String),
}

impl Default for ListOrString {
    fn default() -> Self {
        ListOrString::Text(String::new())
    }
}

impl ListOrString {
    pub fn normalize(&self) -> Vec<String> {
        let items: Vec<String> = match self {
            ListOrString::List(items) => items.iter().map(|s| s.trim().to_string()).collect(),
            ListOrString::Text(text) => text.split(',').map(|s| s.trim().to_string()).collect(),
        };
        items.into_iter().filter(|s| !s.is_empty()).collect()
    }
}

/// Emergency contact input: structured, or a single delimited string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EmergencyContactInput {
    Structured {
        name: String,
        #[serde(default)]
        phone: Option<String>,
    },
    Text(String),
}

impl EmergencyContactInput {
    fn resolve(&self) -> Option<EmergencyContact> {
        match self {
            EmergencyContactInput::Structured { name, phone } => Some(EmergencyContact {
                name: name.trim().to_string(),
                phone: phone
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from),
            }),
            EmergencyContactInput::Text(raw) => EmergencyContact::parse(raw),
        }
    }
}

/// Caller-supplied medical profile fields attached at registration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalProfile {
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub allergies: ListOrString,
    #[serde(default)]
    pub medications: String,
    #[serde(default)]
    pub conditions: ListOrString,
    #[serde(default)]
    pub vaccinations: ListOrString,
    #[serde(default)]
    pub emergency_contact: Option<EmergencyContactInput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpDispatch {
    pub reference_id: String,
    pub subject_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredUser {
    pub id: String,
    pub name: String,
    pub role: Role,
}

/// The handshake orchestrator. Holds the KYC client, the pending store, the
/// user directory, and the OTP dispatch limiter.
pub struct RegistrationService {
    kyc: Arc<KycClient>,
    pending: PendingStore,
    directory: Arc<dyn UserDirectory>,
    rate_limiter: RateLimiter,
}

impl RegistrationService {
    pub fn new(
        kyc: Arc<KycClient>,
        pending: PendingStore,
        directory: Arc<dyn UserDirectory>,
        rate_limiter: RateLimiter,
    ) -> Self {
        Self {
            kyc,
            pending,
            directory,
            rate_limiter,
        }
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Step 1: dispatch an OTP and create the pending entry. The entry is
    /// only written after the provider accepts the dispatch, and a repeated
    /// send for the same subject overwrites the previous entry.
    pub async fn send_otp(
        &self,
        subject_id: &str,
        password: &str,
    ) -> Result<OtpDispatch, RegistrationError> {
        if !kyc::is_valid_subject_id(subject_id) {
            return Err(RegistrationError::Validation(
                "Invalid Aadhaar number".to_string(),
            ));
        }
        if password.is_empty() {
            return Err(RegistrationError::Validation(
                "Password is required".to_string(),
            ));
        }

        if !self.rate_limiter.check(subject_id).await {
            return Err(RegistrationError::RateLimited);
        }

        let reference_id = self.kyc.send_otp(subject_id).await?;
        self.pending.insert(subject_id, password, &reference_id);
        info!("Pending verification created for subject {}", subject_id);

        Ok(OtpDispatch {
            reference_id,
            subject_id: subject_id.to_string(),
        })
    }

    /// Step 2: verify the OTP and attach the profile payload to the pending
    /// entry. The entry is resolved by subject id when supplied, else by the
    /// reference id; the stored reference id is authoritative for the
    /// upstream call (a resend invalidates older reference ids). A failed
    /// verify leaves the entry in place so the caller may retry.
    pub async fn verify_otp(
        &self,
        subject_id: Option<&str>,
        reference_id: &str,
        otp: &str,
    ) -> Result<ProfileSummary, RegistrationError> {
        let subject_id = match subject_id {
            Some(id) => id.to_string(),
            None => {
                if reference_id.is_empty() {
                    return Err(RegistrationError::Validation(
                        "Missing reference ID".to_string(),
                    ));
                }
                self.pending
                    .find_by_reference(reference_id)
                    .ok_or(RegistrationError::SessionExpired)?
            }
        };

        let entry = self
            .pending
            .get(&subject_id)
            .ok_or(RegistrationError::SessionExpired)?;

        if !kyc::is_valid_otp(otp) {
            return Err(RegistrationError::Validation("Invalid OTP".to_string()));
        }

        let payload = self.kyc.verify_otp(&entry.reference_id, otp).await?;
        let summary = payload.summary();

        if !self.pending.attach_verification(&subject_id, payload) {
            return Err(RegistrationError::SessionExpired);
        }

        info!("OTP verified for subject {}", subject_id);
        Ok(summary)
    }

    /// Step 3: assemble and persist the user record, then consume the
    /// pending entry. One-shot: after success the same handshake cannot
    /// register again; a duplicate derived id is rejected without touching
    /// the existing record.
    pub async fn register(
        &self,
        subject_id: &str,
        profile: &MedicalProfile,
    ) -> Result<RegisteredUser, RegistrationError> {
        let entry = self
            .pending
            .get(subject_id)
            .ok_or(RegistrationError::MissingVerification)?;
        let verification = entry
            .verification
            .as_ref()
            .ok_or(RegistrationError::MissingVerification)?;

        let user_id = derive_user_id(&entry.subject_id, &entry.password);
        let record = UserRecord {
            user_id: user_id.clone(),
            subject_id: entry.subject_id.clone(),
            password_hash: hash_password(&entry.password),
            role: Role::Patient,
            name: verification.name(),
            gender: verification.gender(),
            dob: verification.dob(),
            address: verification.address(),
            photo: verification.photo(),
            height: profile.height.trim().to_string(),
            weight: profile.weight.trim().to_string(),
            blood_group: profile.blood_group.trim().to_string(),
            allergies: profile.allergies.normalize(),
            medications: profile.medications.trim().to_string(),
            conditions: profile.conditions.normalize(),
            vaccinations: profile.vaccinations.normalize(),
            emergency_contact: profile
                .emergency_contact
                .as_ref()
                .and_then(EmergencyContactInput::resolve),
            created_at: chrono::Utc::now(),
        };

        match self.directory.create(&record).await? {
            CreateOutcome::AlreadyExists => Err(RegistrationError::DuplicateUser),
            CreateOutcome::Created => {
                self.pending.remove(subject_id);
                info!("Registered user {} for subject {}", user_id, subject_id);
                Ok(RegisteredUser {
                    id: user_id,
                    name: record.name,
                    role: Role::Patient,
                })
            }
        }
    }
}
