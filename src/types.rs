use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identity provider account identifier (the provider's user `id`).
///
/// Opaque to the gateway. Compared verbatim against the id allow-list.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
#[serde(transparent)]
pub struct PrincipalId(pub String);

impl PrincipalId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrincipalId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Server-side session identifier, carried inside the encrypted session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Fresh unguessable id (32 random bytes, base64url).
    #[must_use]
    pub fn generate() -> Self {
        Self(crate::secret::random_token())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Non-secret identifier embedded in every API key (`fameliza_<id>_<secret>`).
///
/// Used to find the stored record before the expensive hash comparison.
/// Knowing it reveals nothing about the secret part.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    FromStr, From, Into,
)]
#[serde(transparent)]
pub struct ApiKeyId(pub Ulid);

impl ApiKeyId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}
