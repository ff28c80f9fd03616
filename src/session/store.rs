use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;

use super::codec::SessionRecord;
use crate::error::Error;
use crate::types::SessionId;

/// Persistence for [`SessionRecord`]s, keyed by [`SessionId`].
///
/// Records are opaque to the store, so a shared cache (Redis, a database table) can back
/// sessions across instances.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, Error>;

    async fn put(&self, id: SessionId, record: SessionRecord) -> Result<(), Error>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, id: &SessionId) -> Result<bool, Error>;

    /// Drop every record expired at `now`. Returns how many were removed.
    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, Error>;
}

/// Process-local session store. Lost on restart, not shared between instances.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<SessionRecord>, Error> {
        Ok(self.sessions.read().get(id).cloned())
    }

    async fn put(&self, id: SessionId, record: SessionRecord) -> Result<(), Error> {
        self.sessions.write().insert(id, record);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, Error> {
        Ok(self.sessions.write().remove(id).is_some())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize, Error> {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired_at(now));
        Ok(before - sessions.len())
    }
}
