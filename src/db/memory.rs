//! In-memory user directory, used in tests and when DynamoDB is disabled.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{CreateOutcome, Error, Role, UserDirectory, UserRecord};

#[derive(Default)]
pub struct MemoryDirectory {
    records: RwLock<HashMap<(Role, String), UserRecord>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn exists(&self, role: Role, user_id: &str) -> Result<bool, Error> {
        let records = self.records.read().unwrap();
        Ok(records.contains_key(&(role, user_id.to_string())))
    }

    async fn create(&self, record: &UserRecord) -> Result<CreateOutcome, Error> {
        let mut records = self.records.write().unwrap();
        let key = (record.role, record.user_id.clone());
        if records.contains_key(&key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        records.insert(key, record.clone());
        Ok(CreateOutcome::Created)
    }

    async fn get(&self, role: Role, user_id: &str) -> Result<Option<UserRecord>, Error> {
        let records = self.records.read().unwrap();
        Ok(records.get(&(role, user_id.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(role: Role, user_id: &str) -> UserRecord {
        UserRecord {
            user_id: user_id.to_string(),
            subject_id: "123456789012".to_string(),
            password_hash: "hash".to_string(),
            role,
            name: "Asha".to_string(),
            gender: String::new(),
            dob: String::new(),
            address: String::new(),
            photo: String::new(),
            height: String::new(),
            weight: String::new(),
            blood_group: String::new(),
            allergies: vec![],
            medications: String::new(),
            conditions: vec![],
            vaccinations: vec![],
            emergency_contact: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trip() {
        let directory = MemoryDirectory::new();
        let outcome = directory
            .create(&record(Role::Patient, "0acb574c93"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created);

        assert!(directory.exists(Role::Patient, "0acb574c93").await.unwrap());
        let stored = directory
            .get(Role::Patient, "0acb574c93")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Asha");
    }

    #[tokio::test]
    async fn duplicate_create_does_not_overwrite() {
        let directory = MemoryDirectory::new();
        directory
            .create(&record(Role::Patient, "0acb574c93"))
            .await
            .unwrap();

        let mut second = record(Role::Patient, "0acb574c93");
        second.name = "Other".to_string();
        let outcome = directory.create(&second).await.unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);

        let stored = directory
            .get(Role::Patient, "0acb574c93")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Asha");
    }

    #[tokio::test]
    async fn collections_are_partitioned_by_role() {
        let directory = MemoryDirectory::new();
        directory
            .create(&record(Role::Patient, "0acb574c93"))
            .await
            .unwrap();

        assert!(!directory.exists(Role::Doctor, "0acb574c93").await.unwrap());
        assert!(directory
            .get(Role::Government, "0acb574c93")
            .await
            .unwrap()
            .is_none());
    }
}
