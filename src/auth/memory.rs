//! In-memory store implementations used by the test suites.
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::{UserStore, VerificationStore};
use crate::auth::repo_types::{User, VerificationCode};
use crate::error::StoreError;

#[derive(Default, Clone)]
pub struct HashMapUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl HashMapUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for HashMapUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.id == id).cloned())
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }
}

/// Records are kept in insertion order, which breaks `created_at` ties.
#[derive(Default, Clone)]
pub struct VecVerificationStore {
    records: Arc<RwLock<Vec<VerificationCode>>>,
}

impl VecVerificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count_for(&self, email: &str) -> usize {
        let records = self.records.read().await;
        records.iter().filter(|r| r.email == email).count()
    }
}

#[async_trait]
impl VerificationStore for VecVerificationStore {
    async fn insert(
        &self,
        email: &str,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> Result<Uuid, StoreError> {
        let record = VerificationCode {
            id: Uuid::new_v4(),
            email: email.to_string(),
            code: code.to_string(),
            created_at: OffsetDateTime::now_utc(),
            expires_at,
        };
        let id = record.id;
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn find_latest_by_email(
        &self,
        email: &str,
    ) -> Result<Option<VerificationCode>, StoreError> {
        let records = self.records.read().await;
        let latest = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.email == email)
            .max_by_key(|(seq, r)| (r.created_at, *seq))
            .map(|(_, r)| r.clone());
        Ok(latest)
    }
}

/// A store whose backend is always down.
#[derive(Default, Clone)]
pub struct UnavailableStore;

#[async_trait]
impl UserStore for UnavailableStore {
    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn create(&self, _email: &str, _password_hash: &str) -> Result<User, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[async_trait]
impl VerificationStore for UnavailableStore {
    async fn insert(
        &self,
        _email: &str,
        _code: &str,
        _expires_at: OffsetDateTime,
    ) -> Result<Uuid, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn find_latest_by_email(
        &self,
        _email: &str,
    ) -> Result<Option<VerificationCode>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn create_rejects_duplicate_email() {
        let store = HashMapUserStore::new();
        store.create("a@x.com", "hash").await.expect("first create");
        let err = store.create("a@x.com", "other").await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_admit_exactly_one() {
        let store = HashMapUserStore::new();
        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create("race@x.com", &format!("hash{i}")).await })
            })
            .collect();

        let mut created = 0;
        for task in tasks {
            match task.await.expect("join") {
                Ok(_) => created += 1,
                Err(StoreError::DuplicateEmail) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn find_by_id_returns_created_user() {
        let store = HashMapUserStore::new();
        let user = store.create("a@x.com", "hash").await.expect("create");
        let found = store.find_by_id(user.id).await.expect("lookup");
        assert_eq!(found.map(|u| u.email), Some("a@x.com".to_string()));
        assert!(store.find_by_id(Uuid::new_v4()).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn latest_code_wins() {
        let store = VecVerificationStore::new();
        let expires = OffsetDateTime::now_utc() + Duration::minutes(10);
        store.insert("a@x.com", "111111", expires).await.expect("insert");
        store.insert("b@x.com", "222222", expires).await.expect("insert");
        store.insert("a@x.com", "333333", expires).await.expect("insert");

        let latest = store
            .find_latest_by_email("a@x.com")
            .await
            .expect("lookup")
            .expect("record");
        assert_eq!(latest.code, "333333");
        assert_eq!(store.count_for("a@x.com").await, 2);
        assert!(store.find_latest_by_email("c@x.com").await.expect("lookup").is_none());
    }
}
