//! User directory persistence.
//!
//! This module defines the user record model and the `UserDirectory` trait
//! over the role-partitioned document collections, with a DynamoDB-backed
//! implementation for production and an in-memory one for tests and local
//! development.

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod dynamodb;
pub mod memory;

/// Canonical user roles. The wire spelling is singular; the storage
/// collections keep the historical plural names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Government,
}

impl Role {
    /// Collection (table) name holding records for this role.
    pub fn collection(self) -> &'static str {
        match self {
            Role::Patient => "patients",
            Role::Doctor => "doctors",
            Role::Government => "government",
        }
    }

    /// Parses the canonical singular spelling; anything else is rejected.
    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "patient" => Some(Role::Patient),
            "doctor" => Some(Role::Doctor),
            "government" => Some(Role::Government),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Government => "government",
        };
        f.write_str(name)
    }
}

/// Emergency contact, either structured or parsed from a single
/// delimited string ("Asha - 9876543210", "Asha, 9876543210").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: Option<String>,
}

impl EmergencyContact {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(at) = raw.find(['-', ',']) {
            let (name, phone) = raw.split_at(at);
            let phone = phone[1..].trim();
            return Some(Self {
                name: name.trim().to_string(),
                phone: (!phone.is_empty()).then(|| phone.to_string()),
            });
        }

        // A bare phone number is common input here.
        let looks_like_phone = raw.len() >= 7
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || c == '+' || c == ' ');
        if looks_like_phone {
            Some(Self {
                name: String::new(),
                phone: Some(raw.to_string()),
            })
        } else {
            Some(Self {
                name: raw.to_string(),
                phone: None,
            })
        }
    }
}

/// A registered user. Immutable once created; no update path exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub subject_id: String,
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    pub gender: String,
    pub dob: String,
    pub address: String,
    pub photo: String,
    pub height: String,
    pub weight: String,
    pub blood_group: String,
    pub allergies: Vec<String>,
    pub medications: String,
    pub conditions: Vec<String>,
    pub vaccinations: Vec<String>,
    pub emergency_contact: Option<EmergencyContact>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The record as returned to callers, with the password hash stripped.
    pub fn public_profile(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.remove("password_hash");
        }
        value
    }
}

/// Outcome of a conditional create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build input: {0}")]
    Build(#[from] aws_sdk_dynamodb::error::BuildError),
    #[error("Failed to put item: {0}")]
    PutItem(SdkError<PutItemError>),
    #[error("Failed to get item: {0}")]
    GetItem(SdkError<GetItemError>),
    #[error("Failed to parse stored record: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Role-partitioned user persistence: existence check, atomic
/// write-if-absent, and read-by-id.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, role: Role, user_id: &str) -> Result<bool, Error>;

    /// Creates the record if and only if no record with its id exists in the
    /// role's collection. The check-and-write is a single atomic operation.
    async fn create(&self, record: &UserRecord) -> Result<CreateOutcome, Error>;

    async fn get(&self, role: Role, user_id: &str) -> Result<Option<UserRecord>, Error>;
}
