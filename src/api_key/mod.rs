//! Bearer API keys: issuance, validation and storage.
//!
//! Keys look like `fameliza_<ULID>_<64 hex chars>`. The ULID is a non-secret record id
//! used to find the stored Argon2 hash; the hex part is 256 bits from the OS CSPRNG.
//! Only the hash is ever stored. The plaintext exists in the [`PlaintextKey`] returned
//! by [`ApiKeyRegistry::issue`] and nowhere else.

mod record;
mod registry;
mod repository;

pub use record::{ApiKeyRecord, KEY_PREFIX, PlaintextKey};
pub use registry::ApiKeyRegistry;
pub use repository::{ApiKeyRepository, InMemoryApiKeyRepository};
