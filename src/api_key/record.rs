use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::secret;
use crate::types::{ApiKeyId, PrincipalId};

/// Fixed, recognizable prefix of every issued key.
pub const KEY_PREFIX: &str = "fameliza_";

const SECRET_HEX_LEN: usize = 64;

/// Stored form of an API key. Holds the Argon2 PHC hash, never the plaintext.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: ApiKeyId,
    pub(crate) key_hash: String,
    pub owner: Option<PrincipalId>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_used_at: Option<OffsetDateTime>,
}

impl ApiKeyRecord {
    #[must_use]
    pub fn new(
        id: ApiKeyId,
        key_hash: String,
        owner: Option<PrincipalId>,
        created_at: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            key_hash,
            owner,
            created_at,
            last_used_at: None,
        }
    }

    /// Argon2 PHC string. Exposed for persistent repository backends.
    #[must_use]
    pub fn key_hash(&self) -> &str {
        &self.key_hash
    }
}

// Hand-written so hashes never reach a log line.
impl std::fmt::Debug for ApiKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyRecord")
            .field("id", &self.id)
            .field("key_hash", &"<redacted>")
            .field("owner", &self.owner)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// Freshly issued key. The only place the plaintext ever exists.
pub struct PlaintextKey {
    id: ApiKeyId,
    value: String,
}

impl PlaintextKey {
    pub(crate) fn generate() -> Self {
        let id = ApiKeyId::generate();
        let value = format!("{KEY_PREFIX}{id}_{}", secret::api_key_secret());
        Self { id, value }
    }

    #[must_use]
    pub fn id(&self) -> ApiKeyId {
        self.id
    }

    /// The key as it must be sent in `Authorization: Bearer <key>`.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl std::fmt::Debug for PlaintextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextKey")
            .field("id", &self.id)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Extract the record id from a candidate key, or `None` if it is not well-formed.
///
/// Pure string inspection; a `Some` says nothing about validity.
pub(crate) fn key_id_of(candidate: &str) -> Option<ApiKeyId> {
    let rest = candidate.strip_prefix(KEY_PREFIX)?;
    let (id, secret) = rest.split_once('_')?;
    if secret.len() != SECRET_HEX_LEN || !secret.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    id.parse().ok()
}
