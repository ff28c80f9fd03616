//! Stateless principal ⇄ session record conversion, plus [`SessionCodec`], which pairs
//! it with an explicit [`SessionStore`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::store::{InMemorySessionStore, SessionStore};
use crate::error::Error;
use crate::principal::Principal;
use crate::types::SessionId;

/// Default absolute session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(24);

/// Stored form of a session: the serialized principal and its validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub payload: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionDecodeError {
    #[error("session expired")]
    Expired,
    #[error("session payload is corrupt: {0}")]
    Corrupt(String),
}

/// Serialize `principal` into a record valid for `ttl` from `issued_at`.
///
/// # Errors
///
/// Returns [`Error::Session`] if the principal cannot be serialized.
pub fn encode(
    principal: &Principal,
    issued_at: OffsetDateTime,
    ttl: Duration,
) -> Result<SessionRecord, Error> {
    let payload = serde_json::to_string(principal)
        .map_err(|e| Error::Session(format!("failed to encode principal: {e}")))?;
    Ok(SessionRecord {
        payload,
        issued_at,
        expires_at: issued_at + ttl,
    })
}

/// Recover the principal from `record` as of `now`.
///
/// # Errors
///
/// [`SessionDecodeError::Expired`] past `expires_at`, [`SessionDecodeError::Corrupt`]
/// if the payload does not parse.
pub fn decode(record: &SessionRecord, now: OffsetDateTime) -> Result<Principal, SessionDecodeError> {
    if record.is_expired_at(now) {
        return Err(SessionDecodeError::Expired);
    }
    serde_json::from_str(&record.payload).map_err(|e| SessionDecodeError::Corrupt(e.to_string()))
}

/// What a session id resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Active(Principal),
    /// Known id, but past its expiry or unreadable. The record has been removed.
    Expired,
    Absent,
}

/// Session lifecycle on top of a [`SessionStore`]. Cheap to clone.
#[derive(Clone)]
pub struct SessionCodec {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
}

impl Default for SessionCodec {
    fn default() -> Self {
        Self::new(InMemorySessionStore::new())
    }
}

impl SessionCodec {
    #[must_use]
    pub fn new(store: impl SessionStore) -> Self {
        Self::from_arc(Arc::new(store))
    }

    #[must_use]
    pub fn from_arc(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_SESSION_TTL,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Persist `principal` under a fresh session id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] on encode or store failure.
    pub async fn establish(&self, principal: &Principal) -> Result<SessionId, Error> {
        let record = encode(principal, OffsetDateTime::now_utc(), self.ttl)?;
        let id = SessionId::generate();
        self.store.put(id.clone(), record).await?;
        Ok(id)
    }

    /// Look up `id`. Expired or corrupt records are deleted on the way out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the store fails.
    pub async fn resolve(&self, id: &SessionId) -> Result<SessionLookup, Error> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(SessionLookup::Absent);
        };

        match decode(&record, OffsetDateTime::now_utc()) {
            Ok(principal) => Ok(SessionLookup::Active(principal)),
            Err(e) => {
                if let SessionDecodeError::Corrupt(detail) = &e {
                    tracing::warn!(error = %detail, "Discarding unreadable session");
                }
                self.store.delete(id).await?;
                Ok(SessionLookup::Expired)
            }
        }
    }

    /// Invalidate `id` now. Unknown ids are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the store cannot delete the record.
    pub async fn logout(&self, id: &SessionId) -> Result<(), Error> {
        self.store.delete(id).await?;
        Ok(())
    }

    /// Remove all expired sessions from the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the store fails.
    pub async fn purge_expired(&self) -> Result<usize, Error> {
        self.store.purge_expired(OffsetDateTime::now_utc()).await
    }
}
