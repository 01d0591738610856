use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::kyc::VerificationPayload;

/// Transient per-subject state carried across the three handshake calls.
///
/// An entry is created only after the provider has accepted the OTP dispatch,
/// so a stored entry always carries a usable reference id. The plaintext
/// password lives here only until registration consumes the entry.
#[derive(Clone, Debug)]
pub struct PendingVerification {
    pub subject_id: String,
    pub password: String,
    pub reference_id: String,
    pub created_at: SystemTime,
    pub verification: Option<VerificationPayload>,
}

impl PendingVerification {
    fn new(subject_id: String, password: String, reference_id: String) -> Self {
        Self {
            subject_id,
            password,
            reference_id,
            created_at: SystemTime::now(),
            verification: None,
        }
    }

    /// Check if the entry has outlived the store TTL.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        SystemTime::now()
            .duration_since(self.created_at)
            .map(|elapsed| elapsed >= ttl)
            .unwrap_or(true)
    }
}

/// Keyed store for pending verifications, with TTL-based expiry.
///
/// Expired entries are treated as absent by every lookup; `cleanup_expired`
/// reaps them so orphaned handshakes do not accumulate.
#[derive(Clone)]
pub struct PendingStore {
    entries: Arc<RwLock<HashMap<String, PendingVerification>>>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Create the entry for `subject_id`, replacing any previous one
    /// (a repeated send-OTP is last-send-wins).
    pub fn insert(&self, subject_id: &str, password: &str, reference_id: &str) {
        let entry = PendingVerification::new(
            subject_id.to_string(),
            password.to_string(),
            reference_id.to_string(),
        );
        self.entries
            .write()
            .unwrap()
            .insert(subject_id.to_string(), entry);
    }

    /// Get a live entry by subject id.
    pub fn get(&self, subject_id: &str) -> Option<PendingVerification> {
        self.entries
            .read()
            .unwrap()
            .get(subject_id)
            .filter(|entry| !entry.is_expired(self.ttl))
            .cloned()
    }

    /// Resolve the subject id owning `reference_id`, for verify calls that
    /// arrive without the subject id.
    pub fn find_by_reference(&self, reference_id: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap()
            .values()
            .find(|entry| entry.reference_id == reference_id && !entry.is_expired(self.ttl))
            .map(|entry| entry.subject_id.clone())
    }

    /// Attach the provider's profile payload after a successful verify.
    /// Returns false if the entry is gone or expired.
    pub fn attach_verification(&self, subject_id: &str, payload: VerificationPayload) -> bool {
        let mut entries = self.entries.write().unwrap();
        match entries.get_mut(subject_id) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                entry.verification = Some(payload);
                true
            }
            _ => false,
        }
    }

    /// Remove and return the entry, consuming the handshake state.
    pub fn remove(&self, subject_id: &str) -> Option<PendingVerification> {
        self.entries.write().unwrap().remove(subject_id)
    }

    /// Remove expired entries.
    pub fn cleanup_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .unwrap()
            .retain(|_, entry| !entry.is_expired(ttl));
    }

    #[cfg(test)]
    fn backdate(&self, subject_id: &str, age: Duration) {
        if let Some(entry) = self.entries.write().unwrap().get_mut(subject_id) {
            entry.created_at = SystemTime::now() - age;
        }
    }
}
