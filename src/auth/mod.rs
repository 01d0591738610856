//! Authentication module.
//!
//! Validates credentials against the user directory and maintains the
//! minimal logged-in context: an opaque token mapped to (user id, role).
//! Login compares one-way password hashes only; plaintext is never stored
//! or compared.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::db::{self, Role, UserDirectory};
use crate::registration::hash_password;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid role")]
    InvalidRole,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<db::Error> for AuthError {
    fn from(err: db::Error) -> Self {
        AuthError::Internal(err.into())
    }
}

/// Logged-in context established by a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
struct SessionData {
    context: SessionContext,
    created_at: SystemTime,
}

impl SessionData {
    fn is_expired(&self, ttl: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.created_at)
            .map(|elapsed| elapsed >= ttl)
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginSuccess {
    pub token: String,
    pub data: serde_json::Value,
}

/// Credential validation and session lifecycle. Sessions carry a TTL;
/// expired tokens are invisible to lookups and reaped by `cleanup_expired`.
#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn UserDirectory>,
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
    ttl: Duration,
}

impl AuthService {
    pub fn new(directory: Arc<dyn UserDirectory>, ttl: Duration) -> Self {
        Self {
            directory,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Validates (id, password, role) and establishes a session. The stored
    /// hash is compared against `sha256(password)`; a missing record and a
    /// wrong password are indistinguishable to the caller.
    pub async fn login(
        &self,
        user_id: &str,
        password: &str,
        role: &str,
    ) -> Result<LoginSuccess, AuthError> {
        if user_id.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "User ID and password are required".to_string(),
            ));
        }
        let role = Role::parse(role).ok_or(AuthError::InvalidRole)?;

        let record = self
            .directory
            .get(role, user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if record.password_hash != hash_password(password) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = Uuid::new_v4().to_string();
        self.sessions.write().unwrap().insert(
            token.clone(),
            SessionData {
                context: SessionContext {
                    user_id: user_id.to_string(),
                    role,
                },
                created_at: SystemTime::now(),
            },
        );
        info!("Login successful for {} {}", role, user_id);

        Ok(LoginSuccess {
            token,
            data: record.public_profile(),
        })
    }

    /// Returns the context for a live session token.
    pub fn session(&self, token: &str) -> Option<SessionContext> {
        self.sessions
            .read()
            .unwrap()
            .get(token)
            .filter(|data| !data.is_expired(self.ttl))
            .map(|data| data.context.clone())
    }

    /// Tears down the session unconditionally; an unknown token is a no-op.
    pub fn logout(&self, token: &str) {
        self.sessions.write().unwrap().remove(token);
    }

    /// Remove expired sessions.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.sessions
            .write()
            .unwrap()
            .retain(|_, data| !data.is_expired(ttl));
    }

    #[cfg(test)]
    fn backdate(&self, token: &str, age: Duration) {
        if let Some(data) = self.sessions.write().unwrap().get_mut(token) {
            data.created_at = SystemTime::now() - age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryDirectory;
    use crate::db::{CreateOutcome, UserRecord};
    use chrono::Utc;

    async fn directory_with_patient() -> Arc<MemoryDirectory> {
        let directory = Arc::new(MemoryDirectory::new());
        let record = UserRecord {
            user_id: "0acb574c93".to_string(),
            subject_id: "123456789012".to_string(),
            password_hash: hash_password("pw1"),
            role: Role::Patient,
            name: "Asha".to_string(),
            gender: "F".to_string(),
            dob: "1990-01-01".to_string(),
            address: "12 MG Road".to_string(),
            photo: String::new(),
            height: "170".to_string(),
            weight: String::new(),
            blood_group: "O+".to_string(),
            allergies: vec![],
            medications: String::new(),
            conditions: vec![],
            vaccinations: vec![],
            emergency_contact: None,
            created_at: Utc::now(),
        };
        assert_eq!(
            directory.create(&record).await.unwrap(),
            CreateOutcome::Created
        );
        directory
    }

    #[tokio::test]
    async fn login_succeeds_with_correct_credentials() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));

        let success = auth.login("0acb574c93", "pw1", "patient").await.unwrap();
        assert_eq!(success.data["name"], "Asha");
        assert!(success.data.get("password_hash").is_none());

        let context = auth.session(&success.token).unwrap();
        assert_eq!(context.user_id, "0acb574c93");
        assert_eq!(context.role, Role::Patient);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));
        let err = auth.login("0acb574c93", "pw2", "patient").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_rejects_unknown_user() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));
        let err = auth.login("ffffffffff", "pw1", "patient").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_rejects_non_canonical_role_spelling() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));
        let err = auth.login("0acb574c93", "pw1", "patients").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidRole));
    }

    #[tokio::test]
    async fn login_requires_id_and_password() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));
        let err = auth.login("", "pw1", "patient").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
        let err = auth.login("0acb574c93", "", "patient").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn sessions_expire_after_ttl() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(60));
        let success = auth.login("0acb574c93", "pw1", "patient").await.unwrap();

        assert!(auth.session(&success.token).is_some());
        auth.backdate(&success.token, Duration::from_secs(120));
        assert!(auth.session(&success.token).is_none());
    }

    #[tokio::test]
    async fn cleanup_reaps_expired_sessions() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(60));
        let stale = auth.login("0acb574c93", "pw1", "patient").await.unwrap();
        let live = auth.login("0acb574c93", "pw1", "patient").await.unwrap();
        auth.backdate(&stale.token, Duration::from_secs(120));

        auth.cleanup_expired();
        assert!(auth.sessions.read().unwrap().get(&stale.token).is_none());
        assert!(auth.session(&live.token).is_some());
    }

    #[tokio::test]
    async fn logout_tears_down_session_unconditionally() {
        let auth = AuthService::new(directory_with_patient().await, Duration::from_secs(3600));
        let success = auth.login("0acb574c93", "pw1", "patient").await.unwrap();

        auth.logout(&success.token);
        assert!(auth.session(&success.token).is_none());

        // Unknown token is a no-op.
        auth.logout("not-a-token");
    }
}
