#![doc = include_str!("../README.md")]

pub mod allowlist;
pub mod api_key;
pub mod error;
#[cfg(feature = "oauth")]
pub mod login;
#[cfg(feature = "middleware")]
pub mod middleware;
#[cfg(feature = "oauth")]
pub mod oauth;
pub mod policy;
pub mod principal;
pub mod secret;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use allowlist::{AllowList, DenialReason};
pub use api_key::{ApiKeyRecord, ApiKeyRegistry, ApiKeyRepository, KEY_PREFIX, PlaintextKey};
pub use error::Error;
#[cfg(feature = "oauth")]
pub use login::{IdentityProviderAdapter, LoginOutcome};
#[cfg(feature = "oauth")]
pub use oauth::{AuthorizationRequest, ProviderClient, ProviderConfig, TokenResponse};
pub use policy::{AccessPolicy, PathPattern, PolicyBucket};
pub use principal::{GroupMembership, Principal};
pub use session::{SessionCodec, SessionLookup, SessionStore};
pub use types::{ApiKeyId, PrincipalId, SessionId};
