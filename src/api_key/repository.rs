use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use time::OffsetDateTime;

use super::record::ApiKeyRecord;
use crate::error::Error;
use crate::types::{ApiKeyId, PrincipalId};

/// Storage backend for [`ApiKeyRecord`]s.
///
/// The registry holds it as `Arc<dyn ApiKeyRepository>`, so a database or shared cache
/// can replace [`InMemoryApiKeyRepository`] without touching validation logic.
/// Implementations must tolerate concurrent calls.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync + 'static {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, Error>;

    /// Insert a new record. Fails if the id is already taken.
    async fn put(&self, record: ApiKeyRecord) -> Result<(), Error>;

    /// Remove a record. Returns whether it existed.
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, Error>;

    /// Records whose non-secret id matches the one embedded in a candidate key.
    async fn scan_candidates_by_prefix(
        &self,
        key_id: &ApiKeyId,
    ) -> Result<Vec<ApiKeyRecord>, Error>;

    /// Set `last_used_at` to `at` unless it already holds a later instant.
    async fn record_use(&self, id: &ApiKeyId, at: OffsetDateTime) -> Result<(), Error>;

    async fn list_by_owner(&self, owner: &PrincipalId) -> Result<Vec<ApiKeyRecord>, Error>;
}

/// Process-local repository.
///
/// The map lock only guards insertion, removal and `Arc` lookup. Each record sits behind
/// its own mutex, so a last-used update never blocks validations of other keys.
#[derive(Default)]
pub struct InMemoryApiKeyRepository {
    records: RwLock<HashMap<ApiKeyId, Arc<Mutex<ApiKeyRecord>>>>,
}

impl InMemoryApiKeyRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn slot(&self, id: &ApiKeyId) -> Option<Arc<Mutex<ApiKeyRecord>>> {
        self.records.read().get(id).cloned()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, Error> {
        Ok(self.slot(id).map(|slot| slot.lock().clone()))
    }

    async fn put(&self, record: ApiKeyRecord) -> Result<(), Error> {
        let mut records = self.records.write();
        if records.contains_key(&record.id) {
            return Err(Error::Registry(format!("duplicate key id {}", record.id)));
        }
        records.insert(record.id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, Error> {
        Ok(self.records.write().remove(id).is_some())
    }

    async fn scan_candidates_by_prefix(
        &self,
        key_id: &ApiKeyId,
    ) -> Result<Vec<ApiKeyRecord>, Error> {
        Ok(self
            .slot(key_id)
            .map(|slot| vec![slot.lock().clone()])
            .unwrap_or_default())
    }

    async fn record_use(&self, id: &ApiKeyId, at: OffsetDateTime) -> Result<(), Error> {
        // A key revoked between verification and this call is simply not touched.
        if let Some(slot) = self.slot(id) {
            let mut record = slot.lock();
            if record.last_used_at.is_none_or(|prev| prev < at) {
                record.last_used_at = Some(at);
            }
        }
        Ok(())
    }

    async fn list_by_owner(&self, owner: &PrincipalId) -> Result<Vec<ApiKeyRecord>, Error> {
        let slots: Vec<_> = self.records.read().values().cloned().collect();
        let mut owned: Vec<ApiKeyRecord> = slots
            .iter()
            .map(|slot| slot.lock().clone())
            .filter(|record| record.owner.as_ref() == Some(owner))
            .collect();
        owned.sort_by_key(|record| record.created_at);
        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(owner: Option<&str>) -> ApiKeyRecord {
        ApiKeyRecord::new(
            ApiKeyId::generate(),
            "hash".into(),
            owner.map(PrincipalId::from),
            OffsetDateTime::now_utc(),
        )
    }

    #[tokio::test]
    async fn put_get_delete() {
        let repo = InMemoryApiKeyRepository::new();
        let rec = record(None);
        let id = rec.id;

        repo.put(rec).await.unwrap();
        assert_eq!(repo.len(), 1);
        assert!(repo.get(&id).await.unwrap().is_some());

        assert!(repo.delete(&id).await.unwrap());
        assert!(!repo.delete(&id).await.unwrap());
        assert!(repo.get(&id).await.unwrap().is_none());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let repo = InMemoryApiKeyRepository::new();
        let rec = record(None);
        repo.put(rec.clone()).await.unwrap();
        assert!(matches!(repo.put(rec).await, Err(Error::Registry(_))));
    }

    #[tokio::test]
    async fn scan_returns_only_the_matching_record() {
        let repo = InMemoryApiKeyRepository::new();
        let wanted = record(None);
        let id = wanted.id;
        repo.put(wanted).await.unwrap();
        repo.put(record(None)).await.unwrap();

        let hits = repo.scan_candidates_by_prefix(&id).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        let misses = repo
            .scan_candidates_by_prefix(&ApiKeyId::generate())
            .await
            .unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn record_use_never_moves_backwards() {
        let repo = InMemoryApiKeyRepository::new();
        let rec = record(None);
        let id = rec.id;
        repo.put(rec).await.unwrap();

        let later = OffsetDateTime::now_utc();
        let earlier = later - Duration::minutes(5);

        repo.record_use(&id, later).await.unwrap();
        repo.record_use(&id, earlier).await.unwrap();
        assert_eq!(repo.get(&id).await.unwrap().unwrap().last_used_at, Some(later));
    }

    #[tokio::test]
    async fn list_by_owner_filters() {
        let repo = InMemoryApiKeyRepository::new();
        repo.put(record(Some("u1"))).await.unwrap();
        repo.put(record(Some("u1"))).await.unwrap();
        repo.put(record(Some("u2"))).await.unwrap();
        repo.put(record(None)).await.unwrap();

        let owned = repo.list_by_owner(&PrincipalId::from("u1")).await.unwrap();
        assert_eq!(owned.len(), 2);
    }
}
