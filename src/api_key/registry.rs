use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use time::OffsetDateTime;

use super::record::{self, ApiKeyRecord, PlaintextKey};
use super::repository::{ApiKeyRepository, InMemoryApiKeyRepository};
use crate::error::Error;
use crate::types::{ApiKeyId, PrincipalId};

/// Lifecycle of bearer API keys: issue, validate, revoke.
///
/// Hashing is Argon2id with a per-key random salt. Both hashing and verification run on
/// the blocking pool. Cheap to clone.
#[derive(Clone)]
pub struct ApiKeyRegistry {
    repository: Arc<dyn ApiKeyRepository>,
    params: Params,
}

impl Default for ApiKeyRegistry {
    fn default() -> Self {
        Self::new(InMemoryApiKeyRepository::new())
    }
}

impl ApiKeyRegistry {
    #[must_use]
    pub fn new(repository: impl ApiKeyRepository) -> Self {
        Self::from_arc(Arc::new(repository))
    }

    #[must_use]
    pub fn from_arc(repository: Arc<dyn ApiKeyRepository>) -> Self {
        Self {
            repository,
            params: Params::DEFAULT,
        }
    }

    /// Override the Argon2 cost used for newly issued keys.
    ///
    /// Existing hashes keep verifying with the parameters encoded in them.
    #[must_use]
    pub fn with_hash_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Issue a key for `owner`. The returned plaintext cannot be recovered later.
    ///
    /// The caller must already have authenticated `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if hashing or the repository write fails.
    pub async fn issue(&self, owner: Option<PrincipalId>) -> Result<PlaintextKey, Error> {
        let key = PlaintextKey::generate();

        let params = self.params.clone();
        let plaintext = key.expose().to_owned();
        let key_hash = tokio::task::spawn_blocking(move || hash_key(params, &plaintext))
            .await
            .map_err(|e| Error::Registry(format!("hashing task failed: {e}")))??;

        let record = ApiKeyRecord::new(key.id(), key_hash, owner, OffsetDateTime::now_utc());
        self.repository.put(record).await?;

        tracing::info!(key_id = %key.id(), "API key issued");
        Ok(key)
    }

    /// Check a candidate key. On a match, stamp the record's last-used time.
    ///
    /// Only `true`/`false` comes back, never the record that matched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the repository or the hashing task fails.
    pub async fn validate(&self, candidate: &str) -> Result<bool, Error> {
        let Some(key_id) = record::key_id_of(candidate) else {
            return Ok(false);
        };

        for stored in self.repository.scan_candidates_by_prefix(&key_id).await? {
            let candidate = candidate.to_owned();
            let stored_hash = stored.key_hash;
            let matched =
                tokio::task::spawn_blocking(move || verify_key(&candidate, &stored_hash))
                    .await
                    .map_err(|e| Error::Registry(format!("verification task failed: {e}")))?;

            if matched {
                self.repository
                    .record_use(&stored.id, OffsetDateTime::now_utc())
                    .await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Delete a key so it no longer validates. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the repository fails.
    pub async fn revoke(&self, id: &ApiKeyId) -> Result<bool, Error> {
        let removed = self.repository.delete(id).await?;
        if removed {
            tracing::info!(key_id = %id, "API key revoked");
        }
        Ok(removed)
    }

    /// Records owned by `owner`, oldest first. Hashes stay inside the records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the repository fails.
    pub async fn list_for_owner(&self, owner: &PrincipalId) -> Result<Vec<ApiKeyRecord>, Error> {
        self.repository.list_by_owner(owner).await
    }

    /// Stored record for `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registry`] if the repository fails.
    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKeyRecord>, Error> {
        self.repository.get(id).await
    }
}

fn hash_key(params: Params, plaintext: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Registry(format!("failed to hash key: {e}")))
}

fn verify_key(candidate: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Stored API key hash is unreadable");
            false
        }
    }
}
