//! Plug-and-play authentication gateway for Axum.
//!
//! Mounts the OAuth login routes and wraps an application router in a middleware that
//! classifies every request path and demands a session or bearer API key where the
//! [`AccessPolicy`](crate::policy::AccessPolicy) says so.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use fameliza_auth::middleware::{Credential, Gateway, GatewayConfig};
//!
//! // 1. Configure from environment
//! let gateway = Gateway::in_memory(GatewayConfig::from_env()?);
//!
//! // 2. Merge the auth routes and protect the whole app
//! let app = axum::Router::new().route("/api/widgets", axum::routing::get(widgets));
//! let app = gateway.protect(app.merge(gateway.routes()));
//!
//! // 3. Handlers behind a gated path can see how the caller authenticated
//! async fn widgets(credential: Credential) -> String {
//!     match credential.principal() {
//!         Some(p) => format!("hello {}", p.display_name()),
//!         None => "hello API client".into(),
//!     }
//! }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod guard;
mod routes;
mod state;

use std::sync::Arc;

use axum::Router;

pub use config::GatewayConfig;
pub use cookies::SessionCookie;
pub use error::AuthError;
pub use guard::{AuthorizationGuard, Credential, bearer_token};

use crate::api_key::{ApiKeyRegistry, ApiKeyRepository, InMemoryApiKeyRepository};
use crate::login::IdentityProviderAdapter;
use crate::policy::AccessPolicy;
use crate::session::{InMemorySessionStore, SessionCodec, SessionStore};
use state::AuthState;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;

/// Login routes plus access middleware over one shared session store and key registry.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Gateway {
    state: AuthState,
}

impl Gateway {
    /// Build a gateway over caller-supplied stores.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        sessions: impl SessionStore,
        api_keys: impl ApiKeyRepository,
    ) -> Self {
        let policy = config.resolved_policy();
        let sessions = SessionCodec::new(sessions).with_ttl(config.settings.session_max_age);
        let api_keys = ApiKeyRegistry::new(api_keys).with_hash_params(config.hash_params);

        Self {
            state: AuthState {
                identity: Arc::new(IdentityProviderAdapter::new(config.client, config.allow_list)),
                guard: AuthorizationGuard::new(sessions, api_keys),
                policy: Arc::new(policy),
                settings: config.settings,
            },
        }
    }

    /// Process-local stores. Sessions and keys are lost on restart.
    #[must_use]
    pub fn in_memory(config: GatewayConfig) -> Self {
        Self::new(
            config,
            InMemorySessionStore::new(),
            InMemoryApiKeyRepository::new(),
        )
    }

    /// Routes under the auth path (`login`, `callback`, `logout`, `me`, `failure`,
    /// `api-key`) and `/health`.
    #[must_use]
    pub fn routes(&self) -> Router {
        routes::auth_routes(self.state.clone())
    }

    /// Wrap `app` in the access middleware.
    #[must_use]
    pub fn protect(&self, app: Router) -> Router {
        app.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            guard::enforce_access,
        ))
    }

    #[must_use]
    pub fn guard(&self) -> &AuthorizationGuard {
        &self.state.guard
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionCodec {
        self.state.guard.sessions()
    }

    #[must_use]
    pub fn api_keys(&self) -> &ApiKeyRegistry {
        self.state.guard.api_keys()
    }

    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.state.policy
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityProviderAdapter {
        &self.state.identity
    }
}
